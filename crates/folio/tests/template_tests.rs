use std::fs;
use std::path::Path;

use folio::{DataError, FolioError, OutputFormat, TemplateError, TemplateStore};
use serde_json::json;
use tempfile::tempdir;

const REPORT: &str = "<h1>{{ title }}</h1>\n{% for s in sections %}<h2>{{ s.heading }}</h2>{% endfor %}\n";
const LETTER: &str = "Dear {{ recipient_name }},\n\n{{ body }}\n";

fn store_with_templates(root: &Path) -> TemplateStore {
    let templates = root.join("templates");
    fs::create_dir_all(&templates).unwrap();
    fs::write(templates.join("simple_report.html.j2"), REPORT).unwrap();
    fs::write(templates.join("letter.md.j2"), LETTER).unwrap();
    fs::write(templates.join("notes.j2"), "{{ title }} - {{ date }}").unwrap();
    fs::write(templates.join("README.txt"), "not a template").unwrap();
    TemplateStore::new(templates, root.join("output"))
}

#[test]
fn test_list_templates_only_returns_j2_files() {
    let dir = tempdir().unwrap();
    let store = store_with_templates(dir.path());

    assert_eq!(
        store.list_templates().unwrap(),
        vec!["letter.md.j2", "notes.j2", "simple_report.html.j2"]
    );
}

#[test]
fn test_missing_templates_directory_lists_nothing() {
    let dir = tempdir().unwrap();
    let store = TemplateStore::new(dir.path().join("nope"), dir.path().join("out"));
    assert!(store.list_templates().unwrap().is_empty());
}

#[test]
fn test_render_substitutes_context_without_escaping() {
    let dir = tempdir().unwrap();
    let store = store_with_templates(dir.path());

    let rendered = store
        .render(
            "simple_report.html.j2",
            &json!({"title": "Q3 <draft>", "sections": [{"heading": "Intro"}, {"heading": "End"}]}),
        )
        .unwrap();

    assert_eq!(rendered, "<h1>Q3 <draft></h1>\n<h2>Intro</h2><h2>End</h2>\n");
}

#[test]
fn test_missing_variable_is_a_render_error() {
    let dir = tempdir().unwrap();
    let store = store_with_templates(dir.path());

    let err = store
        .render("letter.md.j2", &json!({"recipient_name": "Ada"}))
        .unwrap_err();

    assert!(matches!(err, FolioError::Template(TemplateError::Render { .. })));
}

#[test]
fn test_unknown_template_is_not_found() {
    let dir = tempdir().unwrap();
    let store = store_with_templates(dir.path());

    for name in ["absent.html.j2", "../templates/letter.md.j2"] {
        let err = store.render(name, &json!({})).unwrap_err();
        assert!(matches!(err, FolioError::Template(TemplateError::NotFound { .. })));
    }
}

#[test]
fn test_generate_writes_output_named_after_template() {
    let dir = tempdir().unwrap();
    let store = store_with_templates(dir.path());

    let output = store
        .generate(
            "letter.md.j2",
            r#"{"recipient_name": "Ada", "body": "Hello."}"#,
        )
        .unwrap();

    assert_eq!(output.format, OutputFormat::Markdown);
    assert_eq!(output.content, "Dear Ada,\n\nHello.\n");
    assert_eq!(output.file_name(), "letter_output.md");
    assert_eq!(fs::read_to_string(&output.file_path).unwrap(), output.content);
}

#[test]
fn test_regenerating_overwrites_previous_output() {
    let dir = tempdir().unwrap();
    let store = store_with_templates(dir.path());

    let first = store
        .generate("notes.j2", r#"{"title": "one", "date": "2024-01-01"}"#)
        .unwrap();
    let second = store
        .generate("notes.j2", r#"{"title": "two", "date": "2024-01-02"}"#)
        .unwrap();

    assert_eq!(first.file_path, second.file_path);
    assert_eq!(second.file_name(), "notes_output.txt");
    assert_eq!(fs::read_to_string(&second.file_path).unwrap(), "two - 2024-01-02");
    assert_eq!(fs::read_dir(store.output_dir()).unwrap().count(), 1);
}

#[test]
fn test_invalid_json_is_rejected_before_rendering() {
    let dir = tempdir().unwrap();
    let store = store_with_templates(dir.path());

    let err = store
        .generate("letter.md.j2", "{\"recipient_name\": \"Ada\",")
        .unwrap_err();

    assert!(matches!(err, FolioError::Data(DataError::InvalidJson { .. })));
    assert!(err.user_message().contains("Invalid JSON"));
    assert!(!store.output_dir().exists());
}

#[test]
fn test_default_contexts_render_demo_templates() {
    let dir = tempdir().unwrap();
    let store = store_with_templates(dir.path());

    let report_context = store.default_context("simple_report.html.j2");
    assert_eq!(report_context["sections"].as_array().unwrap().len(), 4);
    assert!(store.render("simple_report.html.j2", &report_context).is_ok());

    let letter_context = store.default_context("letter.md.j2");
    assert!(store.render("letter.md.j2", &letter_context).is_ok());
}
