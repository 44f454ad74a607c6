//! LaTeX rendering: [`ResumeRecord`] → [`LatexDocument`].
//!
//! ## Why an AST instead of string templates?
//!
//! Every value in a record comes from a language model and may contain any of
//! LaTeX's special characters. Building the document as a tree of [`Node`]s
//! where data can only enter through [`Node::Text`] means escaping happens in
//! exactly one place ([`escape_latex`], applied on emission) and cannot be
//! forgotten at a new call site. Markup goes through [`Node::Raw`] and is
//! never escaped; link targets go through [`Node::Url`].
//!
//! The document uses the widely shared one-page "Jake's resume" macros
//! (`\resumeSubheading`, `\resumeItem`, …) defined in [`PREAMBLE`].
//! Rendering is pure and deterministic: equal records produce byte-identical
//! output.

use crate::record::{
    EducationEntry, ExperienceEntry, LatexDocument, ProjectEntry, ResumeRecord, Skills,
};

/// Document class, packages, layout and resume macros.
pub const PREAMBLE: &str = r"\documentclass[letterpaper,11pt]{article}

\usepackage{latexsym}
\usepackage[empty]{fullpage}
\usepackage{titlesec}
\usepackage{marvosym}
\usepackage[usenames,dvipsnames]{color}
\usepackage{verbatim}
\usepackage{enumitem}
\usepackage[hidelinks]{hyperref}
\usepackage{fancyhdr}
\usepackage[english]{babel}
\usepackage{tabularx}
\input{glyphtounicode}

\pagestyle{fancy}
\fancyhf{}
\fancyfoot{}
\renewcommand{\headrulewidth}{0pt}
\renewcommand{\footrulewidth}{0pt}

\addtolength{\oddsidemargin}{-0.5in}
\addtolength{\evensidemargin}{-0.5in}
\addtolength{\textwidth}{1in}
\addtolength{\topmargin}{-.5in}
\addtolength{\textheight}{1.0in}

\urlstyle{same}

\raggedbottom
\raggedright
\setlength{\tabcolsep}{0in}

\titleformat{\section}{
  \vspace{-4pt}\scshape\raggedright\large
}{}{0em}{}[\color{black}\titlerule \vspace{-5pt}]

\pdfgentounicode=1

\newcommand{\resumeItem}[1]{
  \item\small{
    {#1 \vspace{-2pt}}
  }
}

\newcommand{\resumeSubheading}[4]{
  \vspace{-2pt}\item
    \begin{tabular*}{0.97\textwidth}[t]{l@{\extracolsep{\fill}}r}
      \textbf{#1} & #2 \\
      \textit{\small#3} & \textit{\small #4} \\
    \end{tabular*}\vspace{-7pt}
}

\newcommand{\resumeProjectHeading}[2]{
    \item
    \begin{tabular*}{0.97\textwidth}{l@{\extracolsep{\fill}}r}
      \small#1 & #2 \\
    \end{tabular*}\vspace{-7pt}
}

\newcommand{\resumeSubItem}[1]{\resumeItem{#1}\vspace{-4pt}}

\renewcommand\labelitemii{$\vcenter{\hbox{\tiny$\bullet$}}$}

\newcommand{\resumeSubHeadingListStart}{\begin{itemize}[leftmargin=0.15in, label={}]}
\newcommand{\resumeSubHeadingListEnd}{\end{itemize}}
\newcommand{\resumeItemListStart}{\begin{itemize}}
\newcommand{\resumeItemListEnd}{\end{itemize}\vspace{-5pt}}
";

/// Escape LaTeX special characters in running text.
///
/// `& % $ # _ { }` get a backslash, `~` and `^` become their text-mode
/// commands. Backslashes are left alone.
pub fn escape_latex(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 8);
    for c in input.chars() {
        match c {
            '&' => out.push_str(r"\&"),
            '%' => out.push_str(r"\%"),
            '$' => out.push_str(r"\$"),
            '#' => out.push_str(r"\#"),
            '_' => out.push_str(r"\_"),
            '{' => out.push_str(r"\{"),
            '}' => out.push_str(r"\}"),
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            other => out.push(other),
        }
    }
    out
}

// ── AST ──────────────────────────────────────────────────────────────────────

/// A fragment of LaTeX source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Markup, emitted verbatim.
    Raw(String),
    /// Data, escaped on emission.
    Text(String),
    /// A link target for `\href`. Braces, backslashes and whitespace are
    /// dropped so the argument cannot close early; `%` and `#` are escaped
    /// because the target may sit inside another macro's argument.
    Url(String),
    /// Children in order.
    Seq(Vec<Node>),
}

impl Node {
    fn write(&self, out: &mut String) {
        match self {
            Node::Raw(s) => out.push_str(s),
            Node::Text(s) => out.push_str(&escape_latex(s)),
            Node::Url(s) => {
                for c in s.chars() {
                    match c {
                        '{' | '}' | '\\' => {}
                        '%' => out.push_str(r"\%"),
                        '#' => out.push_str(r"\#"),
                        c if c.is_whitespace() => {}
                        c => out.push(c),
                    }
                }
            }
            Node::Seq(children) => children.iter().for_each(|n| n.write(out)),
        }
    }

    /// Serialise the tree.
    pub fn emit(&self) -> String {
        let mut out = String::new();
        self.write(&mut out);
        out
    }
}

fn raw(s: impl Into<String>) -> Node {
    Node::Raw(s.into())
}

fn text(s: impl Into<String>) -> Node {
    Node::Text(s.into())
}

fn seq(nodes: impl IntoIterator<Item = Node>) -> Node {
    Node::Seq(nodes.into_iter().collect())
}

/// `\href{url}{\underline{label}}`
fn link(url: &str, label: Node) -> Node {
    seq([
        raw(r"\href{"),
        Node::Url(url.to_string()),
        raw(r"}{\underline{"),
        label,
        raw("}}"),
    ])
}

// ── Document ─────────────────────────────────────────────────────────────────

/// Render a record to a complete, compilable LaTeX document.
pub fn render(record: &ResumeRecord) -> LatexDocument {
    LatexDocument::from_source(document(record).emit())
}

/// The document tree for a record.
pub fn document(record: &ResumeRecord) -> Node {
    let mut body = vec![
        raw(PREAMBLE),
        raw("\n\\begin{document}\n\n"),
        header(record),
        raw("\n"),
        education_section(&record.education),
        raw("\n"),
        skills_section(&record.skills),
        raw("\n"),
        experience_section(&record.experience),
        raw("\n"),
        projects_section(&record.projects),
    ];
    if !record.achievements.is_empty() {
        body.push(raw("\n"));
        body.push(achievements_section(&record.achievements));
    }
    body.push(raw("\n\\end{document}\n"));
    seq(body)
}

fn header(record: &ResumeRecord) -> Node {
    let mut contact = vec![
        raw(r"    \small "),
        text(&record.phone),
        raw(r" $|$ "),
        link(&format!("mailto:{}", record.email), text(&record.email)),
    ];

    if let Some(url) = &record.linkedin {
        contact.push(raw(" $|$\n    "));
        contact.push(link(url, seq([raw("linkedin.com/in/"), text(profile_handle(url))])));
    }
    if let Some(url) = &record.github {
        contact.push(raw(" $|$\n    "));
        contact.push(link(url, seq([raw("github.com/"), text(profile_handle(url))])));
    }
    if let Some(url) = &record.portfolio {
        contact.push(raw(" $|$\n    "));
        contact.push(link(url, text(display_url(url))));
    }

    seq([
        raw("\\begin{center}\n"),
        raw(r"    \textbf{\Huge \scshape "),
        text(&record.name),
        raw("} \\\\ \\vspace{1pt}\n"),
        seq(contact),
        raw("\n\\end{center}\n"),
    ])
}

/// Last non-empty path segment of a profile URL, ignoring query and fragment.
pub fn profile_handle(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .find(|seg| !seg.trim().is_empty())
        .unwrap_or(path)
}

/// A URL without its scheme or trailing slash, for display.
fn display_url(url: &str) -> &str {
    let trimmed = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    trimmed.trim_end_matches('/')
}

fn section(title: &str, content: Node) -> Node {
    seq([raw(format!("\\section{{{title}}}\n")), content])
}

/// `\resumeSubHeadingListStart … \resumeSubHeadingListEnd`; present even
/// with no entries.
fn subheading_list(entries: Vec<Node>) -> Node {
    let mut nodes = vec![raw("  \\resumeSubHeadingListStart\n")];
    nodes.extend(entries);
    nodes.push(raw("  \\resumeSubHeadingListEnd\n"));
    seq(nodes)
}

fn item_list(items: &[String]) -> Node {
    let mut nodes = vec![raw("      \\resumeItemListStart\n")];
    for item in items {
        nodes.push(seq([
            raw(r"        \resumeItem{"),
            text(item),
            raw("}\n"),
        ]));
    }
    nodes.push(raw("      \\resumeItemListEnd\n"));
    seq(nodes)
}

fn subheading(top_left: Node, top_right: Node, bottom_left: Node, bottom_right: Node) -> Node {
    seq([
        raw("    \\resumeSubheading\n      {"),
        top_left,
        raw("}{"),
        top_right,
        raw("}\n      {"),
        bottom_left,
        raw("}{"),
        bottom_right,
        raw("}\n"),
    ])
}

fn education_section(entries: &[EducationEntry]) -> Node {
    let items = entries
        .iter()
        .map(|edu| {
            let degree = match &edu.gpa {
                Some(gpa) => seq([text(&edu.degree), raw(", GPA: "), text(gpa)]),
                None => text(&edu.degree),
            };
            subheading(
                text(&edu.institution),
                text(&edu.location),
                degree,
                text(&edu.graduation_date),
            )
        })
        .collect();
    section("Education", subheading_list(items))
}

fn skills_section(skills: &Skills) -> Node {
    let slots = [
        ("Languages", &skills.languages),
        ("Frameworks", &skills.frameworks),
        ("Libraries", &skills.libraries),
        ("Tools", &skills.tools),
    ];

    let mut clauses = Vec::new();
    for (label, slot) in slots {
        let Some(items) = slot.as_ref().filter(|v| !v.is_empty()) else {
            continue;
        };
        if !clauses.is_empty() {
            clauses.push(raw(r" \\ "));
        }
        clauses.push(seq([
            raw(format!("\\textbf{{{label}}}{{: ")),
            text(items.join(", ")),
            raw("}"),
        ]));
    }

    section(
        "Skills",
        seq([
            raw(" \\begin{itemize}[leftmargin=0.15in, label={}]\n"),
            raw("    \\small{\\item{\n     "),
            seq(clauses),
            raw("\n    }}\n"),
            raw(" \\end{itemize}\n"),
        ]),
    )
}

fn experience_section(entries: &[ExperienceEntry]) -> Node {
    let items = entries
        .iter()
        .map(|exp| {
            seq([
                subheading(
                    text(&exp.company),
                    text(&exp.location),
                    text(&exp.position),
                    seq([text(&exp.start_date), raw(" -- "), text(&exp.end_date)]),
                ),
                item_list(&exp.highlights),
            ])
        })
        .collect();
    section("Experience", subheading_list(items))
}

fn projects_section(entries: &[ProjectEntry]) -> Node {
    let items = entries
        .iter()
        .map(|proj| {
            let mut title = vec![raw(r"\textbf{"), text(&proj.name), raw("}")];
            if !proj.technologies.is_empty() {
                title.push(raw(r" $|$ \emph{"));
                title.push(text(proj.technologies.join(", ")));
                title.push(raw("}"));
            }
            let right = match &proj.link {
                Some(url) => link(url, text(display_url(url))),
                None => Node::Seq(Vec::new()),
            };
            seq([
                raw("    \\resumeProjectHeading\n      {"),
                seq(title),
                raw("}{"),
                right,
                raw("}\n"),
                item_list(&proj.highlights),
            ])
        })
        .collect();
    section("Projects", subheading_list(items))
}

fn achievements_section(achievements: &[String]) -> Node {
    let mut nodes = vec![raw(" \\begin{itemize}[leftmargin=0.15in, label={}]\n")];
    for a in achievements {
        nodes.push(seq([raw(r"    \resumeItem{"), text(a), raw("}\n")]));
    }
    nodes.push(raw(" \\end{itemize}\n"));
    section("Achievements", seq(nodes))
}
