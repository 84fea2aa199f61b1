//! Prompt construction, final-answer extraction, and scorer-facing
//! normalization.

/// Delimiter separating free-form reasoning from the scorable answer.
pub const FINAL_ANSWER_MARKER: &str = "FINAL ANSWER:";

/// The benchmark's output contract, verbatim.
pub const SYSTEM_INSTRUCTION: &str = "You are a general AI assistant. I will ask you a question. \
Report your thoughts, and finish your answer with the following template: \
FINAL ANSWER: [YOUR FINAL ANSWER]. YOUR FINAL ANSWER should be a number OR as few words as \
possible OR a comma separated list of numbers and/or strings. If you are asked for a number, \
don't use comma to write your number neither use units such as $ or percent sign unless \
specified otherwise. If you are asked for a string, don't use articles, neither abbreviations \
(e.g. for cities), and write the digits in plain text unless specified otherwise. If you are \
asked for a comma separated list, apply the above rules depending of whether the element to be \
put in the list is a number or a string.";

/// Sentinel answer recorded when the model call itself fails.
pub const ANSWER_ERROR_SENTINEL: &str = "Error generating answer";

/// Reasoning placeholder used when the response carries no marker.
pub const NO_MARKER_REASONING: &str = "Direct answer provided";

/// Filler prefixes stripped from model answers, checked in this order; the
/// first match wins.
const FILLER_PREFIXES: &[&str] = &[
    "the answer is ",
    "it is ",
    "that would be ",
    "i believe ",
    "i think ",
    "this is ",
];

/// Compose the user prompt: context (when any) ahead of the question, then
/// the terminal-marker reminder.
pub fn build_user_prompt(question: &str, context: &str) -> String {
    if context.is_empty() {
        format!(
            "Question: {question}\n\n\
             Remember: End your response with \"FINAL ANSWER: [YOUR ANSWER]\" \
             following the formatting rules."
        )
    } else {
        format!(
            "Here is some information that may help answer the question:\n\n\
             {context}\n\n\
             Question: {question}\n\n\
             Remember: End your response with \"FINAL ANSWER: [YOUR ANSWER]\" \
             following the formatting rules."
        )
    }
}

/// Split a raw model response into `(answer, reasoning)` on the last
/// occurrence of the marker. Without a marker the whole response is the
/// answer and the reasoning is a fixed placeholder.
pub fn extract_final_answer(raw: &str) -> (String, String) {
    match raw.rfind(FINAL_ANSWER_MARKER) {
        Some(idx) => {
            let answer = raw[idx + FINAL_ANSWER_MARKER.len()..].trim().to_string();
            let reasoning = raw[..idx].trim().to_string();
            (answer, reasoning)
        }
        None => (raw.trim().to_string(), NO_MARKER_REASONING.to_string()),
    }
}

/// Normalize a raw answer to the scorer's literal form.
///
/// One pass applies, in order: trim, first-matching filler-prefix strip, one
/// matching quote layer, trailing periods, whitespace collapse, trim. The
/// pass repeats until a fixpoint so the function is idempotent even when a
/// stripped quote layer exposes a fresh filler prefix. Every pass only ever
/// removes characters, so the loop terminates.
pub fn format_answer(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let next = format_pass(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn format_pass(s: &str) -> String {
    let mut answer = s.trim().to_string();

    for prefix in FILLER_PREFIXES {
        let head = answer.get(..prefix.len());
        if head.is_some_and(|h| h.eq_ignore_ascii_case(prefix)) {
            answer = answer[prefix.len()..].trim().to_string();
            break;
        }
    }

    let bytes = answer.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            answer = answer[1..answer.len() - 1].to_string();
        }
    }

    answer = answer.trim_end_matches('.').to_string();

    answer.split_whitespace().collect::<Vec<_>>().join(" ")
}
