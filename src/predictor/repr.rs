//! Bounded textual representation.

/// Upper bound (exclusive) on the length of a predictor representation.
pub const MAX_REPR_LENGTH: usize = 120;

const ELLIPSIS: &str = "...";

fn closer(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// Render `TypeName(body)` in fewer than [`MAX_REPR_LENGTH`] characters.
///
/// Overlong bodies are cut and marked with `...`; brackets opened inside the
/// kept part are closed again.
pub(crate) fn bounded(type_name: &str, body: &str) -> String {
    let overhead = type_name.chars().count() + 2;
    let budget = MAX_REPR_LENGTH.saturating_sub(overhead + 1);
    format!("{type_name}({})", truncate_balanced(body, budget))
}

fn truncate_balanced(body: &str, budget: usize) -> String {
    if body.chars().count() <= budget {
        return body.to_string();
    }

    let mut out = String::new();
    let mut used = 0;
    let mut open: Vec<char> = Vec::new();
    for c in body.chars() {
        let depth = match c {
            '(' | '[' | '{' => open.len() + 1,
            ')' | ']' | '}' if !open.is_empty() => open.len() - 1,
            _ => open.len(),
        };
        if used + 1 + ELLIPSIS.len() + depth > budget {
            break;
        }
        match c {
            '(' | '[' | '{' => open.push(c),
            ')' | ']' | '}' => {
                open.pop();
            }
            _ => {}
        }
        out.push(c);
        used += 1;
    }

    out.push_str(ELLIPSIS);
    while let Some(c) = open.pop() {
        out.push(closer(c));
    }
    out
}
