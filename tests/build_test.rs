//! Article building tests.
//!
//! End-to-end coverage of the per-section pipeline over realistic letter
//! content: section detection, math cleanup, wrap accumulation across
//! formula paragraphs, and asset filename assignment.

use epistle::{Config, build_articles};

const FIXTURES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

fn read_fixture(name: &str) -> String {
    let path = format!("{}/{}", FIXTURES_DIR, name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("reading {path}: {e}"))
}

fn journal_config() -> Config {
    Config {
        preamble: Some(
            "In the interests of transparency, eLife publishes the most substantive \
            revision requests and the accompanying author responses."
                .to_string(),
        ),
        doi_pattern: Some("10.7554/eLife.{manuscript}.{id}".to_string()),
        fig_filename_pattern: Some("elife-{manuscript:0>5}-{id}-fig{number}".to_string()),
        video_filename_pattern: Some("elife-{manuscript:0>5}-{id}-video{number}".to_string()),
        italic_to_disp_quote: true,
    }
}

#[test]
fn test_multi_paragraph_figure_legend() {
    let content = read_fixture("author_response_image_1.xml");
    let articles = build_articles(
        &content,
        Some("elife-00666.docx"),
        Some(&journal_config()),
    )
    .unwrap();
    assert_eq!(articles.len(), 1);

    let article = &articles[0];
    assert_eq!(article.article_type, "reply");
    assert_eq!(article.id, "sa1");
    assert_eq!(article.doi.as_deref(), Some("10.7554/eLife.666.sa1"));
    assert_eq!(article.manuscript, Some(666));

    // The whole legend, including the formula paragraphs the converter
    // split out, collapses into one figure block.
    assert_eq!(article.content_blocks.len(), 1);
    let block = &article.content_blocks[0];
    assert_eq!(block.block_type, "fig");
    assert_eq!(
        block.content,
        "<label>Author response image 1.</label><caption>\
        <title>Title up to first full stop. Caption <sup>2+</sup> calculated using\
        <disp-formula><mml:math alttext=\"\\alpha\"><mml:mi>α</mml:mi></mml:math></disp-formula>\
        <disp-formula><mml:math alttext=\"\\beta\"><mml:mi>β</mml:mi></mml:math></disp-formula>\
        and those on the right panels using\
        <disp-formula><mml:math alttext=\"\\gamma\"><mml:mi>γ</mml:mi></mml:math></disp-formula>\
        under symmetrical ionic conditions.</title>\
        <p>The number of barriers <inline-formula><mml:math alttext=\"n\" display=\"inline\">\
        <mml:mi>n</mml:mi></mml:math></inline-formula> have their usual meanings</p></caption>\
        <graphic mimetype=\"image\" xlink:href=\"elife-00666-sa1-fig1\" />"
    );
}

#[test]
fn test_figure_placeholder_without_config() {
    let content = read_fixture("author_response_image_1.xml");
    let articles = build_articles(&content, None, None).unwrap();
    let block = &articles[0].content_blocks[0];
    assert!(block.content.contains("xlink:href=\"todo\""));
    assert_eq!(articles[0].doi, None);
    assert_eq!(articles[0].manuscript, None);
}

#[test]
fn test_kitchen_sink_blocks() {
    let content = read_fixture("kitchen_sink.xml");
    let articles = build_articles(
        &content,
        Some("elife-00666.docx"),
        Some(&journal_config()),
    )
    .unwrap();
    assert_eq!(articles.len(), 2);

    let decision = &articles[0];
    assert_eq!(decision.article_type, "decision-letter");
    let types: Vec<&str> = decision
        .content_blocks
        .iter()
        .map(|b| b.block_type.as_str())
        .collect();
    assert_eq!(types, vec!["boxed-text", "p", "fig"]);
    // The explicit preamble section wins over the config default.
    assert_eq!(
        decision.content_blocks[0].content,
        "<p>In the interests of transparency, this preamble explains the review process.</p>"
    );
    // Consecutive prose paragraphs rejoin into one physical paragraph.
    assert_eq!(
        decision.content_blocks[1].content,
        "Thank you for submitting your article to the journal.\
        The reviewers request clarification, summarized below."
    );
    assert_eq!(
        decision.content_blocks[2].content,
        "<label>Decision letter image 1.</label>\
        <caption><title>Reviewer sketch</title></caption>\
        <graphic mimetype=\"image\" xlink:href=\"elife-00666-sa1-fig1\" />"
    );

    let response = &articles[1];
    assert_eq!(response.article_type, "reply");
    assert_eq!(response.id, "sa2");
    let types: Vec<&str> = response
        .content_blocks
        .iter()
        .map(|b| b.block_type.as_str())
        .collect();
    assert_eq!(
        types,
        vec!["disp-quote", "p", "fig", "media", "table-wrap", "list", "p"]
    );

    assert_eq!(
        response.content_blocks[0].content,
        "<p>1) Please quantify the effect in Author response image 1.</p>\
        <p>2) Please provide the raw data.</p>"
    );
    assert_eq!(
        response.content_blocks[0].attr("content-type"),
        Some("editor-comment")
    );
    assert_eq!(
        response.content_blocks[2].content,
        "<label>Author response image 1.</label>\
        <caption><title>Quantified effect</title></caption>\
        <graphic mimetype=\"image\" xlink:href=\"elife-00666-sa2-fig1\" />"
    );
    assert_eq!(
        response.content_blocks[3].content,
        "<label>Author response video 1.</label><caption><title>Time course</title></caption>"
    );
    assert_eq!(
        response.content_blocks[3].attr("xlink:href"),
        Some("elife-00666-sa2-video1")
    );
    assert_eq!(
        response.content_blocks[4].content,
        "<label>Author response Table 1.</label>\
        <caption><title>Summary of measurements</title></caption>\
        <table frame=\"hsides\" rules=\"groups\">\
        <thead><tr><th>Condition</th><th>Value</th></tr></thead>\
        <tbody><tr><td>Control</td><td>1.0</td></tr></tbody></table>"
    );
    assert_eq!(
        response.content_blocks[5].attr("list-type"),
        Some("order")
    );
    assert_eq!(
        response.content_blocks[6].content,
        "See Author response video 1 and Author response Table 1 for details."
    );
}

#[test]
fn test_malformed_section_is_fatal() {
    let content = "<p><bold>Author response</bold></p><p>Unclosed";
    assert!(build_articles(content, None, None).is_err());
}
