use crate::models::{TextField, Ticket};

/// Whitespace-delimited tokens summed over lines. Blank lines add nothing.
pub fn word_count(text: &str) -> usize {
    text.lines()
        .map(|line| line.split_whitespace().count())
        .sum()
}

pub fn comment_word_count(ticket: &Ticket) -> usize {
    ticket
        .comments
        .iter()
        .map(|comment| word_count(&comment.body))
        .sum()
}

pub fn field_word_count(ticket: &Ticket, field: TextField) -> usize {
    match field {
        TextField::Summary => word_count(&ticket.summary),
        TextField::Description => word_count(&ticket.description),
        TextField::Comments => comment_word_count(ticket),
    }
}

pub fn summary_description_word_count(ticket: &Ticket) -> usize {
    word_count(&ticket.summary) + word_count(&ticket.description)
}

/// Joins the parts with single spaces, flattening any line breaks inside them.
pub fn concat_flat<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut joined = String::new();
    for part in parts {
        if !joined.is_empty() {
            joined.push(' ');
        }
        joined.push_str(&part.replace("\r\n", " ").replace('\n', " "));
    }
    joined
}

/// Everything a scorer reads for a ticket: summary, description and comments.
pub fn ticket_text(ticket: &Ticket) -> String {
    concat_flat(
        [ticket.summary.as_str(), ticket.description.as_str()]
            .into_iter()
            .chain(ticket.comments.iter().map(|comment| comment.body.as_str()))
            .filter(|part| !part.trim().is_empty()),
    )
}
