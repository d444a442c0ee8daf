use super::*;

fn plain(markdown: &str) -> String {
    console::strip_ansi_codes(&render_markdown(markdown)).into_owned()
}

#[test]
fn plain_text_is_unchanged() {
    assert_eq!(plain("Just a sentence."), "Just a sentence.");
    assert_eq!(plain(""), "");
}

#[test]
fn blocks_are_separated_by_blank_lines() {
    let markdown = "# Title\n\nSome **bold** and *italic* text.\n\nSecond paragraph.";
    assert_eq!(
        plain(markdown),
        "Title\n\nSome bold and italic text.\n\nSecond paragraph."
    );
}

#[test]
fn lists_get_markers() {
    let markdown = "- one\n- two\n\n1. first\n2. second";
    assert_eq!(plain(markdown), "• one\n• two\n\n1. first\n2. second");
}

#[test]
fn ordered_lists_keep_their_start() {
    assert_eq!(plain("3. three\n4. four"), "3. three\n4. four");
}

#[test]
fn nested_lists_are_indented() {
    assert_eq!(plain("- outer\n  - inner"), "• outer\n  • inner");
}

#[test]
fn code_blocks_are_indented() {
    let markdown = "Example:\n\n```rust\nfn main() {}\n```";
    assert_eq!(plain(markdown), "Example:\n\n    rust\n    fn main() {}");
}

#[test]
fn inline_code_keeps_its_text() {
    assert_eq!(plain("Call `embed()` first."), "Call embed() first.");
}

#[test]
fn links_show_their_target() {
    assert_eq!(
        plain("See [the docs](https://example.com/docs)."),
        "See the docs (https://example.com/docs)."
    );
}

#[test]
fn soft_breaks_become_newlines() {
    assert_eq!(plain("line one\nline two"), "line one\nline two");
}

#[test]
fn styling_is_applied_when_forced() {
    let previous = console::colors_enabled();
    console::set_colors_enabled(true);
    let rendered = render_markdown("**bold**");
    console::set_colors_enabled(previous);

    assert_ne!(rendered, "bold");
    assert!(rendered.contains("bold"));
}
