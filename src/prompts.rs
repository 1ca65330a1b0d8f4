//! Prompt builders for each stage of a QA run.

/// System prompt shared by every agent request
pub const SYSTEM_PROMPT: &str = "You are a QA assistant specialized in HTML, JavaScript and CSS \
    applications. You can inspect and operate the page under test with the provided tools: \
    screenshot, get_html, click, fill and get_text. Selectors are CSS selectors.";

/// Ask for a numbered functional test plan for the loaded page
pub fn plan_prompt(target: &str) -> String {
    format!(
        "The web application at {target} is loaded in the browser.\n\
        First call get_html to study its markup, then write a functional UI test plan for it.\n\n\
        Requirements:\n\
        - Cover every interactive control: buttons, inputs, forms, links and dynamic content.\n\
        - Include edge cases such as empty input, invalid input and repeated actions.\n\
        - Each test is ONE concrete action followed by what to verify.\n\n\
        Output ONLY the plan as a numbered list, one test per line, in the form:\n\
        1. <action> and verify <expected result>\n\
        2. ...\n\
        Do not add headings, commentary or blank numbered lines."
    )
}

/// Ask the agent to execute one plan step and report on it
pub fn step_prompt(step_description: &str, step_index: usize) -> String {
    format!(
        "Execute this test step on the current page:\n\
        {step_description}\n\n\
        Follow this procedure:\n\
        1. Take a screenshot labeled \"step_{step_index}_before\".\n\
        2. Perform the action described by the step using click, fill or get_text.\n\
        3. Take a screenshot labeled \"step_{step_index}_after\".\n\
        4. Call get_html and inspect the current markup for the expected change.\n\n\
        Then report in plain text whether the step PASSED or FAILED. \
        Describe any bug, error or unexpected behaviour you observed. \
        If everything worked as expected, say so without using the words \
        bug, issue, error, failed, incorrect or unexpected."
    )
}

/// Ask for a root-cause analysis of the issues found during a run
pub fn analysis_prompt(issues: &[String], html: &str) -> String {
    format!(
        "The following issues were found while testing a web application:\n\n\
        {issues}\n\n\
        Here is the application's original HTML source:\n\
        ```html\n{html}\n```\n\n\
        For each issue, identify the root cause in the source (quote the relevant \
        code), explain why it produces the observed behaviour, and describe the fix. \
        Ignore issues that come from the test tooling rather than the application.",
        issues = numbered(issues),
    )
}

/// Ask for a complete corrected HTML document
pub fn fix_prompt(issues: &[String], analysis: &str, html: &str) -> String {
    format!(
        "Fix the bugs in this web application.\n\n\
        Issues found during testing:\n{issues}\n\n\
        Root-cause analysis:\n{analysis}\n\n\
        Original HTML source:\n\
        ```html\n{html}\n```\n\n\
        Return the COMPLETE corrected HTML document in a single ```html code block. \
        Keep all existing functionality and change only what is needed to fix the issues.",
        issues = numbered(issues),
    )
}

fn numbered(issues: &[String]) -> String {
    if issues.is_empty() {
        return "(no issues were recorded)".to_string();
    }
    issues
        .iter()
        .enumerate()
        .map(|(i, issue)| format!("{}. {}", i + 1, issue.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pull the HTML document out of a model answer.
///
/// Prefers the contents of an ```html fence, then any fence, then the answer
/// as is.
pub fn extract_html(answer: &str) -> String {
    fenced_block(answer, "```html")
        .or_else(|| fenced_block(answer, "```"))
        .unwrap_or(answer)
        .trim()
        .to_string()
}

fn fenced_block<'a>(text: &'a str, opener: &str) -> Option<&'a str> {
    let start = text.find(opener)?;
    let after_opener = &text[start + opener.len()..];
    // Skip the rest of the opening line (language tag or nothing)
    let body_start = after_opener.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_opener[body_start..];
    let end = body.find("```").unwrap_or(body.len());
    Some(&body[..end])
}
