//! `{{attribute}}` placeholders in element options.

use crate::event::Event;

/// True when `template` contains at least one placeholder.
pub fn is_dynamic(template: &str) -> bool {
    template
        .find("{{")
        .is_some_and(|start| template[start..].contains("}}"))
}

/// Replace each `{{name}}` with the event's metadata value for `name`.
///
/// Unknown or null attributes render as the empty string. An unterminated
/// `{{` is kept as literal text.
pub fn render(template: &str, event: &Event) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            break;
        };
        out.push_str(&rest[..start]);
        let name = rest[start + 2..start + 2 + len].trim();
        if let Some(value) = event.metadata.get_str(name) {
            out.push_str(&value);
        }
        rest = &rest[start + 2 + len + 2..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_attributes() {
        let event = Event::new("x")
            .with_attribute("id", 42)
            .with_attribute("name", "orders");
        assert_eq!(
            render("http://localhost:8005/{{name}}/{{ id }}", &event),
            "http://localhost:8005/orders/42"
        );
        assert_eq!(render("{{missing}}-x", &event), "-x");
    }

    #[test]
    fn static_text_passes_through() {
        let event = Event::new("x");
        assert!(!is_dynamic("http://localhost/a"));
        assert!(!is_dynamic("{{open"));
        assert!(is_dynamic("{{message.id}}"));
        assert_eq!(render("plain", &event), "plain");
        assert_eq!(render("a {{open", &event), "a {{open");
    }
}
