//! Nested tag markup for tool output
//!
//! Two spaces of indentation per nesting level. Text is inserted verbatim:
//! content containing tag-like text will break the structure, and callers
//! must not rely on the output being well-formed XML.

use crate::models::{Contact, RenderedMessage};

/// One `<tag>content</tag>` line at `indent_level`
pub fn element(tag: &str, content: &str, indent_level: usize) -> String {
    let indent = "  ".repeat(indent_level);
    format!("{indent}<{tag}>{content}</{tag}>")
}

pub fn contact_block(contact: &Contact, indent_level: usize) -> String {
    let indent = "  ".repeat(indent_level);
    let inner = indent_level + 1;
    [
        format!("{indent}<contact>"),
        element("id", &contact.identifier, inner),
        element("title", contact.title.as_deref().unwrap_or_default(), inner),
        element("subtitle", contact.subtitle.as_deref().unwrap_or_default(), inner),
        element("valid", &contact.valid.to_string(), inner),
        format!("{indent}</contact>"),
    ]
    .join("\n")
}

pub fn message_block(message: &RenderedMessage, indent_level: usize) -> String {
    let indent = "  ".repeat(indent_level);
    let inner = indent_level + 1;
    [
        format!("{indent}<message>"),
        element("from", &message.from_display, inner),
        element("to", &message.to_display, inner),
        element("content", &message.content_display, inner),
        element("time", &message.time_display, inner),
        element("is_self", if message.is_self { "true" } else { "false" }, inner),
        format!("{indent}</message>"),
    ]
    .join("\n")
}

/// `<contacts>` document; an empty slice still yields the open/close pair
pub fn contacts_document(contacts: &[Contact]) -> String {
    document("contacts", contacts.iter().map(|c| contact_block(c, 1)))
}

/// `<chat_logs>` document; an empty slice still yields the open/close pair
pub fn chat_logs_document(messages: &[RenderedMessage]) -> String {
    document("chat_logs", messages.iter().map(|m| message_block(m, 1)))
}

fn document(tag: &str, children: impl Iterator<Item = String>) -> String {
    std::iter::once(format!("<{tag}>"))
        .chain(children)
        .chain(std::iter::once(format!("</{tag}>")))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::{chat_logs_document, contacts_document, element};
    use crate::models::{Contact, Icon, RenderedMessage};

    #[test]
    fn element_indents_two_spaces_per_level() {
        assert_eq!(element("id", "x", 0), "<id>x</id>");
        assert_eq!(element("id", "x", 2), "    <id>x</id>");
    }

    #[test]
    fn empty_documents_keep_parent_pair() {
        assert_eq!(contacts_document(&[]), "<contacts>\n</contacts>");
        assert_eq!(chat_logs_document(&[]), "<chat_logs>\n</chat_logs>");
    }

    #[test]
    fn contact_document_layout() {
        let contact = Contact {
            identifier: "wxid_a".to_owned(),
            title: Some("Alice".to_owned()),
            subtitle: None,
            icon: Icon::default(),
            valid: 1,
        };
        let expected = "<contacts>\n  <contact>\n    <id>wxid_a</id>\n    <title>Alice</title>\n    <subtitle></subtitle>\n    <valid>1</valid>\n  </contact>\n</contacts>";
        assert_eq!(contacts_document(&[contact]), expected);
    }

    #[test]
    fn message_content_is_not_escaped() {
        let message = RenderedMessage {
            from_display: "Alice".to_owned(),
            to_display: "Bob".to_owned(),
            content_display: "a < b & <b>bold</b>".to_owned(),
            time_display: "2023-11-14 22:13:20".to_owned(),
            is_self: true,
        };
        let doc = chat_logs_document(&[message]);
        assert!(doc.contains("    <content>a < b & <b>bold</b></content>"));
        assert!(doc.contains("    <is_self>true</is_self>"));
        assert!(doc.starts_with("<chat_logs>\n  <message>\n    <from>Alice</from>"));
    }
}
