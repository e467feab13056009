use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use label_templates::{
    common::error::AppError,
    middleware::request::{LabelRequest, RequestUser},
    models::{
        inventory::{Part, PartParameter, PrintObject, StockLocation},
        label::{media_path, CreateLabelPayload, LabelKind, LabelTemplate},
    },
    services::{
        label_renderer::LabelRenderer,
        pdf::{PdfConverter, PdfJob},
        plugins::{CompanyInfoContributor, PluginRegistry},
    },
};

#[derive(Default)]
struct RecordingConverter {
    pages: Mutex<Vec<String>>,
}

impl PdfConverter for RecordingConverter {
    fn convert(&self, job: &PdfJob<'_>) -> Result<Vec<u8>, AppError> {
        self.pages.lock().unwrap().extend(job.pages.iter().cloned());
        Ok(format!("%PDF {} pages", job.pages.len()).into_bytes())
    }
}

fn part(pk: i64, name: &str, ipn: &str) -> Part {
    Part {
        pk,
        name: name.into(),
        full_name: Part::format_full_name(name, Some(ipn), None),
        description: Some("Resistor".into()),
        ipn: Some(ipn.into()),
        revision: None,
        keywords: None,
        active: true,
        assembly: false,
        component: true,
        trackable: false,
        purchaseable: true,
        salable: false,
        category: None,
        parameters: vec![PartParameter {
            name: "Resistance".into(),
            data: "10k".into(),
            units: Some("Ohm".into()),
        }],
    }
}

fn request() -> LabelRequest {
    let at = NaiveDate::from_ymd_opt(2025, 1, 2)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();
    LabelRequest::new(
        "https://inv.example.com",
        "/api/label/part/1/print",
        Some(RequestUser { username: "maria".into() }),
    )
    .at(at)
}

fn create_template(root: &Path, kind: LabelKind, file_name: &str, source: &str, filters: &str) -> LabelTemplate {
    let payload: CreateLabelPayload = serde_json::from_value(serde_json::json!({
        "name": "Part QR",
        "templateFileName": file_name,
        "template": source,
        "filenamePattern": "{{ part.pk }}-{{ date }}.pdf",
        "filters": filters,
    }))
    .unwrap();

    let (template, upload) = payload.into_template(kind).unwrap();

    let path = media_path(root, &upload.path);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, upload.content).unwrap();

    template
}

#[test]
fn prints_one_page_per_object_with_plugin_context() {
    let dir = tempfile::tempdir().unwrap();
    let template = create_template(
        dir.path(),
        LabelKind::Part,
        "qr.html",
        "<p>{{ company_name }}</p><p>{{ IPN }} {{ parameters.Resistance.data }}</p><p>{{ user.username }}</p>",
        "",
    );
    assert_eq!(template.label, "label/template/part/qr.html");

    let converter = Arc::new(RecordingConverter::default());
    let plugins = PluginRegistry::builder()
        .register(CompanyInfoContributor::new("ACME"))
        .build();
    let renderer = LabelRenderer::new(dir.path(), plugins, converter.clone());

    let objects = vec![
        PrintObject::Part(part(10, "R_10K", "IPN-010")),
        PrintObject::Part(part(11, "R_22K", "IPN-011")),
    ];

    let document = renderer.render_many(&template, &objects, &request()).unwrap();

    assert_eq!(document.filename, "10-2025-01-02.pdf");
    assert_eq!(document.bytes, b"%PDF 2 pages");
    assert_eq!(
        *converter.pages.lock().unwrap(),
        vec![
            "<p>ACME</p><p>IPN-010 10k</p><p>maria</p>".to_string(),
            "<p>ACME</p><p>IPN-011 10k</p><p>maria</p>".to_string(),
        ]
    );
}

#[test]
fn debug_output_is_the_concatenated_html() {
    let dir = tempfile::tempdir().unwrap();
    let template = create_template(dir.path(), LabelKind::Part, "name.html", "<b>{{ name }}</b>", "");
    let renderer = LabelRenderer::new(
        dir.path(),
        PluginRegistry::empty(),
        Arc::new(RecordingConverter::default()),
    );

    let objects = vec![
        PrintObject::Part(part(1, "A", "IPN-A")),
        PrintObject::Part(part(2, "B", "IPN-B")),
    ];

    let html = renderer.render_many_as_string(&template, &objects, &request()).unwrap();
    assert_eq!(html, "<b>A</b>\n<b>B</b>");
}

#[test]
fn printing_nothing_or_the_wrong_kind_fails() {
    let dir = tempfile::tempdir().unwrap();
    let template = create_template(dir.path(), LabelKind::Part, "p.html", "<b>{{ name }}</b>", "");
    let renderer = LabelRenderer::new(
        dir.path(),
        PluginRegistry::empty(),
        Arc::new(RecordingConverter::default()),
    );

    let err = renderer.render_many(&template, &[], &request()).unwrap_err();
    assert!(matches!(err, AppError::NothingToPrint));

    let location = PrintObject::StockLocation(StockLocation {
        pk: 4,
        name: "Shelf A".into(),
        description: None,
        pathstring: "Store/Shelf A".into(),
        structural: false,
        external: false,
        parent: None,
    });
    let err = renderer.render_many(&template, &[location], &request()).unwrap_err();
    assert!(matches!(err, AppError::KindMismatch { .. }));
}

#[test]
fn filters_select_the_labels_that_apply() {
    let dir = tempfile::tempdir().unwrap();
    let template = create_template(
        dir.path(),
        LabelKind::Part,
        "filtered.html",
        "<b>{{ name }}</b>",
        "IPN__startswith=IPN-0,active=true",
    );
    assert_eq!(template.filters, "IPN__startswith=IPN-0,active=true");

    let matching = [PrintObject::Part(part(10, "R_10K", "IPN-010"))];
    let other = [PrintObject::Part(part(12, "C_1U", "CAP-1"))];

    assert!(template.applies_to(&matching));
    assert!(!template.applies_to(&other));
}

#[test]
fn quantities_in_context_are_normalized() {
    let location = StockLocation {
        pk: 1,
        name: "Bin".into(),
        description: None,
        pathstring: "Bin".into(),
        structural: false,
        external: false,
        parent: None,
    };
    let item = label_templates::models::inventory::StockItem {
        pk: 7,
        part: part(10, "R_10K", "IPN-010"),
        location: Some(location),
        quantity: Decimal::new(12_500, 3),
        serial: None,
        batch: Some("B-1".into()),
        status: 10,
        barcode_data: String::new(),
        barcode_hash: String::new(),
        tests: Vec::new(),
    };

    let context = PrintObject::StockItem(item).label_context(&request());
    assert_eq!(context["quantity"], serde_json::json!(12.5));
    assert_eq!(context["serial"], serde_json::Value::Null);
}
