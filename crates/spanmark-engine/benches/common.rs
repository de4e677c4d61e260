// Shared by every bench target; each one uses a different subset
#[allow(dead_code)]
pub fn generate_article(sections: usize) -> spanmark_engine::Document {
    let mut doc = spanmark_engine::Document::new();
    let root = doc.root();
    let article = doc.append_element(root, "article", &[("id", "post"), ("class", "post")]);
    for section in 0..sections {
        let h2 = doc.append_element(article, "h2", &[]);
        doc.append_text(h2, &format!("Section {section}"));
        let p = doc.append_element(article, "p", &[("class", "post__body")]);
        doc.append_text(
            p,
            &format!("Paragraph {section} has some content. The restoration cascade relocates spans."),
        );
    }
    doc
}

/// Text leaf of the paragraph in `section`
#[allow(dead_code)]
pub fn paragraph_text(doc: &spanmark_engine::Document, section: usize) -> spanmark_engine::NodeId {
    use spanmark_engine::TreeAdapter;
    let article = doc.children(doc.root())[0];
    let p = doc.children(article)[section * 2 + 1];
    doc.children(p)[0]
}
