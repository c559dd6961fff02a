use editbored_engine::markdown::{render_markdown, to_markdown};
use editbored_engine::{BlockKind, EmbedType};
use pretty_assertions::assert_eq;

fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(format!(
        "{}/tests/fixtures/{name}.md",
        env!("CARGO_MANIFEST_DIR")
    ))
    .unwrap()
}

#[test]
fn fixture_kitchen_sink_roundtrips() {
    assert_fixture_roundtrips("kitchen_sink");
}

#[test]
fn fixture_escapes_roundtrip() {
    assert_fixture_roundtrips("escapes");
}

fn assert_fixture_roundtrips(name: &str) {
    let md = read_fixture(name);
    let doc = render_markdown(&md);
    assert_eq!(to_markdown(&doc), md);
}

#[test]
fn rendering_twice_is_stable() {
    let md = "Text with  *odd* __emphasis__ and\nsoft break\n\n* star list\n";
    let once = to_markdown(&render_markdown(md));
    let twice = to_markdown(&render_markdown(&once));
    assert_eq!(once, twice);
    assert_eq!(once, "Text with  *odd* **emphasis** and soft break\n\n- star list\n");
}

#[test]
fn only_images_become_embeds_when_rendering() {
    let doc = render_markdown(&read_fixture("kitchen_sink"));

    let embeds = doc.embeds();
    assert_eq!(embeds.len(), 1);
    assert_eq!(embeds[0].1.embed_type, EmbedType::Image);

    // Bare URLs stay as text until an editor session scans them
    let bare = doc
        .text_blocks()
        .into_iter()
        .filter_map(|id| doc.get(id))
        .filter(|block| block.kind == BlockKind::Paragraph)
        .any(|block| block.text() == "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    assert!(bare);
}
