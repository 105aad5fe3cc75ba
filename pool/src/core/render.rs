//! Minimal documents synthesized when the worker produced no artifacts

use regex::Regex;
use shared::OptimizeJob;
use std::sync::LazyLock;

/// Name used when none can be extracted from the CV
pub const DEFAULT_CANDIDATE: &str = "Kandydat";

static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<h1[^>]*>(.*?)</h1>").expect("valid regex"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static CV_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(cv|resume|curriculum|životopis)").expect("valid regex"));
static FULL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-ZĄĆĘŁŃÓŚŹŻ][a-ząćęłńóśźż]+\s+[A-ZĄĆĘŁŃÓŚŹŻ][a-ząćęłńóśźż]+").expect("valid regex")
});

/// Best-effort candidate name: an `<h1>` heading, else a capitalised name line near the top
pub fn extract_candidate_name(cv_text: &str) -> String {
    if cv_text.chars().count() < 10 {
        return DEFAULT_CANDIDATE.to_string();
    }

    if let Some(heading) = HEADING.captures(cv_text).and_then(|c| c.get(1)) {
        let name = TAG.replace_all(heading.as_str(), "");
        let name = name.trim();
        let len = name.chars().count();
        if len > 2 && len < 50 {
            return name.to_string();
        }
    }

    let candidates = cv_text
        .lines()
        .map(str::trim)
        .filter(|line| line.chars().count() > 2)
        .take(5);

    for line in candidates {
        if CV_HEADER.is_match(line) || !FULL_NAME.is_match(line) {
            continue;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        if (2..=4).contains(&words.len()) {
            return words.iter().take(3).copied().collect::<Vec<_>>().join(" ");
        }
    }

    DEFAULT_CANDIDATE.to_string()
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Plain HTML rendering of the submitted CV, flagged as emergency output
pub fn basic_html(job: &OptimizeJob) -> String {
    let name = escape_html(&extract_candidate_name(&job.current_cv));
    let body = escape_html(&job.current_cv);
    format!(
        r#"<!DOCTYPE html>
<html lang="pl">
<head>
    <meta charset="UTF-8">
    <title>CV - {name}</title>
    <style>
        body {{ font-family: Arial, sans-serif; max-width: 800px; margin: 40px auto; padding: 20px; }}
        h1 {{ color: #2c3e50; border-bottom: 2px solid #3498db; }}
        .section {{ margin: 20px 0; }}
        .fallback-note {{ background: #f39c12; color: white; padding: 10px; border-radius: 5px; margin-bottom: 20px; }}
    </style>
</head>
<body>
    <div class="fallback-note">⚠️ CV wygenerowane w trybie awaryjnym</div>
    <h1>{name}</h1>
    <div class="section">
        <h2>Treść CV</h2>
        <pre style="white-space: pre-wrap; font-family: inherit;">{body}</pre>
    </div>
</body>
</html>"#
    )
}

/// Generic Polish cover letter addressed from the candidate
pub fn cover_letter(job: &OptimizeJob) -> String {
    let name = extract_candidate_name(&job.current_cv);
    let email = if job.email.trim().is_empty() {
        "email@example.com"
    } else {
        job.email.trim()
    };
    let position = if job.has_job_posting() {
        " opisane w Państwa ogłoszeniu"
    } else {
        " w Państwa firmie"
    };

    format!(
        "Szanowni Państwo,

Z dużym zainteresowaniem aplikuję na stanowisko{position}. {name} - jestem przekonany/a, że moje umiejętności idealnie odpowiadają Państwa wymaganiom.

Moje kluczowe kompetencje obejmują:
• Doświadczenie w realizacji projektów zgodnie z wysokimi standardami
• Umiejętności współpracy zespołowej i komunikacji
• Ciągłe doskonalenie zawodowe i adaptację do nowych technologii
• Efektywne rozwiązywanie problemów i zarządzanie czasem

Jestem entuzjastycznie nastawiony/a do możliwości dołączenia do Państwa zespołu i wniesienia swojego wkładu w rozwój organizacji.

Z poważaniem,
{name}
{email}"
    )
}
