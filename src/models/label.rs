// src/models/label.rs

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::common::filters::{validate_filter_string, FilterSet};
use crate::models::inventory::{EntityType, PrintObject};

// Pasta comum onde ficam os templates enviados (abaixo de MEDIA_ROOT).
pub const TEMPLATE_ROOT: &str = "label/template";

// Extensões aceitas para o arquivo de template.
pub const ALLOWED_EXTENSIONS: &[&str] = &["html"];

// Dimensão mínima (em mm) de uma etiqueta.
pub const MIN_DIMENSION_MM: f64 = 2.0;

pub const DEFAULT_WIDTH_MM: f64 = 50.0;
pub const DEFAULT_HEIGHT_MM: f64 = 20.0;
pub const DEFAULT_FILENAME_PATTERN: &str = "label.pdf";

// --- 1. Tipos de Etiqueta ---
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "label_kind", rename_all = "lowercase")] // Banco
#[serde(rename_all = "lowercase")] // JSON
pub enum LabelKind {
    StockItem,     // Vira "stockitem"
    StockLocation, // Vira "stocklocation"
    Part,          // Vira "part"
    BuildLine,     // Vira "buildline"
}

impl LabelKind {
    pub const ALL: [LabelKind; 4] = [
        LabelKind::StockItem,
        LabelKind::StockLocation,
        LabelKind::Part,
        LabelKind::BuildLine,
    ];

    /// Subpasta onde os arquivos deste tipo são guardados.
    pub fn subdir(self) -> &'static str {
        match self {
            LabelKind::StockItem => "stockitem",
            LabelKind::StockLocation => "stocklocation",
            LabelKind::Part => "part",
            LabelKind::BuildLine => "buildline",
        }
    }

    /// Segmento usado nas rotas da API (`/api/label/{slug}`).
    pub fn api_slug(self) -> &'static str {
        match self {
            LabelKind::StockItem => "stock",
            LabelKind::StockLocation => "location",
            LabelKind::Part => "part",
            LabelKind::BuildLine => "buildline",
        }
    }

    pub fn from_api_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.api_slug() == slug)
    }

    pub fn entity_type(self) -> EntityType {
        match self {
            LabelKind::StockItem => EntityType::StockItem,
            LabelKind::StockLocation => EntityType::StockLocation,
            LabelKind::Part => EntityType::Part,
            LabelKind::BuildLine => EntityType::BuildLine,
        }
    }

    pub fn of(object: &PrintObject) -> Self {
        match object {
            PrintObject::StockItem(_) => LabelKind::StockItem,
            PrintObject::StockLocation(_) => LabelKind::StockLocation,
            PrintObject::Part(_) => LabelKind::Part,
            PrintObject::BuildLine(_) => LabelKind::BuildLine,
        }
    }

    /// Escolhe o validador de filtros do tipo.
    pub fn validate_filters(self, filters: &str) -> Result<FilterSet, ValidationError> {
        match self {
            LabelKind::StockItem => validate_stock_item_filters(filters),
            LabelKind::StockLocation => validate_stock_location_filters(filters),
            LabelKind::Part => validate_part_filters(filters),
            LabelKind::BuildLine => validate_build_line_filters(filters),
        }
    }
}

impl fmt::Display for LabelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.subdir())
    }
}

// ---
// Validadores de filtros (um por tipo de entidade)
// ---
pub fn validate_stock_item_filters(filters: &str) -> Result<FilterSet, ValidationError> {
    validate_filter_string(filters, EntityType::StockItem)
}

pub fn validate_stock_location_filters(filters: &str) -> Result<FilterSet, ValidationError> {
    validate_filter_string(filters, EntityType::StockLocation)
}

pub fn validate_part_filters(filters: &str) -> Result<FilterSet, ValidationError> {
    validate_filter_string(filters, EntityType::Part)
}

pub fn validate_build_line_filters(filters: &str) -> Result<FilterSet, ValidationError> {
    validate_filter_string(filters, EntityType::BuildLine)
}

fn validate_template_extension(path: &str) -> Result<(), ValidationError> {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => {
            let mut err = ValidationError::new("file_extension");
            err.add_param("allowed_extensions".into(), &ALLOWED_EXTENSIONS);
            err.message = Some(
                format!("Extensão de arquivo não permitida. Use: {}", ALLOWED_EXTENSIONS.join(", ")).into(),
            );
            Err(err)
        }
    }
}

/// Monta o caminho relativo do template enviado: `label/template/<subdir>/<arquivo>`.
/// Apenas o nome base do arquivo é mantido, para evitar path traversal.
pub fn rename_label(kind: LabelKind, filename: &str) -> Result<String, ValidationError> {
    let basename = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if basename.is_empty() || basename == "." || basename == ".." {
        let mut err = ValidationError::new("file_name");
        err.message = Some("Nome de arquivo inválido.".into());
        return Err(err);
    }

    Ok(format!("{}/{}/{}", TEMPLATE_ROOT, kind.subdir(), basename))
}

// --- 2. Template de Etiqueta ---
// Um único registro para os quatro tipos; o `kind` escolhe os filtros e o contexto.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabelTemplate {
    pub id: i64,
    pub kind: LabelKind,

    #[validate(length(min = 1, max = 100, message = "O nome deve ter entre 1 e 100 caracteres."))]
    pub name: String,

    #[validate(length(max = 250, message = "A descrição deve ter no máximo 250 caracteres."))]
    pub description: Option<String>,

    // Caminho relativo ao MEDIA_ROOT (ex: "label/template/part/qr.html")
    #[validate(custom(function = "validate_template_extension"))]
    pub label: String,

    pub enabled: bool,

    #[validate(range(min = 2.0, message = "A largura mínima é 2 mm."))]
    pub width: f64,

    #[validate(range(min = 2.0, message = "A altura mínima é 2 mm."))]
    pub height: f64,

    #[validate(length(min = 1, max = 100, message = "O padrão de nome de arquivo deve ter entre 1 e 100 caracteres."))]
    pub filename_pattern: String,

    #[validate(length(max = 250, message = "Os filtros devem ter no máximo 250 caracteres."))]
    pub filters: String,

    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LabelTemplate {
    /// Validação completa do registro: campos + filtros do tipo.
    pub fn full_clean(&self) -> Result<(), ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };

        if let Err(e) = self.kind.validate_filters(&self.filters) {
            errors.add("filters", e);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Filtros já separados. Um registro salvo sempre passou por `full_clean`.
    pub fn filter_set(&self) -> FilterSet {
        FilterSet::parse(&self.filters).unwrap_or_default()
    }

    /// Caminho absoluto do template no disco.
    pub fn template_name(&self, media_root: &Path) -> PathBuf {
        media_path(media_root, &self.label)
    }

    /// A etiqueta se aplica a todos os objetos?
    pub fn applies_to(&self, objects: &[PrintObject]) -> bool {
        let filters = self.filter_set();
        objects.iter().all(|object| filters.matches(&object.to_json()))
    }
}

impl fmt::Display for LabelTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.name,
            self.description.as_deref().unwrap_or("None")
        )
    }
}

/// Resolve um caminho relativo (com `/` ou `\\`) dentro do MEDIA_ROOT.
pub fn media_path(media_root: &Path, relative: &str) -> PathBuf {
    let mut path = media_root.to_path_buf();
    for component in relative.split(['/', '\\']).filter(|c| !c.is_empty()) {
        path.push(component);
    }
    path
}

/// Um arquivo de template que precisa ser gravado no MEDIA_ROOT.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateUpload {
    pub path: String,
    pub content: String,
}

// ---
// Payloads da API
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLabelPayload {
    #[schema(example = "Etiqueta QR 50x20")]
    pub name: String,

    pub description: Option<String>,

    #[schema(example = "qr_label.html")]
    #[validate(custom(function = "validate_template_extension"))]
    pub template_file_name: String,

    // Conteúdo HTML do template
    #[validate(length(min = 1, message = "O conteúdo do template é obrigatório."))]
    pub template: String,

    pub enabled: Option<bool>,
    pub width: Option<f64>,
    pub height: Option<f64>,

    #[schema(example = "{{ item.pk }}-label.pdf")]
    pub filename_pattern: Option<String>,

    #[schema(example = "part__IPN=IPN-001")]
    pub filters: Option<String>,

    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

impl CreateLabelPayload {
    /// Monta o registro (ainda sem id) e o arquivo a ser gravado.
    pub fn into_template(self, kind: LabelKind) -> Result<(LabelTemplate, TemplateUpload), ValidationErrors> {
        self.validate()?;

        let label = rename_label(kind, &self.template_file_name).map_err(|e| {
            let mut errors = ValidationErrors::new();
            errors.add("template_file_name", e);
            errors
        })?;

        let now = Utc::now();
        let template = LabelTemplate {
            id: 0,
            kind,
            name: self.name,
            description: self.description,
            label: label.clone(),
            enabled: self.enabled.unwrap_or(true),
            width: self.width.unwrap_or(DEFAULT_WIDTH_MM),
            height: self.height.unwrap_or(DEFAULT_HEIGHT_MM),
            filename_pattern: self
                .filename_pattern
                .unwrap_or_else(|| DEFAULT_FILENAME_PATTERN.to_string()),
            filters: self.filters.unwrap_or_default(),
            metadata: self.metadata.unwrap_or_else(|| serde_json::json!({})),
            created_at: now,
            updated_at: now,
        };

        template.full_clean()?;

        Ok((template, TemplateUpload { path: label, content: self.template }))
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLabelPayload {
    pub name: Option<String>,
    // Ausente: mantém; `null` ou "": limpa a descrição
    #[serde(default, deserialize_with = "clearable")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub template_file_name: Option<String>,
    pub template: Option<String>,
    pub enabled: Option<bool>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub filename_pattern: Option<String>,
    pub filters: Option<String>,
}

impl UpdateLabelPayload {
    /// Aplica as mudanças e valida o registro resultante.
    /// Retorna o arquivo a gravar, se o template foi trocado.
    pub fn apply(self, template: &mut LabelTemplate) -> Result<Option<TemplateUpload>, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(name) = self.name {
            template.name = name;
        }
        if let Some(description) = self.description {
            template.description = description;
        }
        if let Some(enabled) = self.enabled {
            template.enabled = enabled;
        }
        if let Some(width) = self.width {
            template.width = width;
        }
        if let Some(height) = self.height {
            template.height = height;
        }
        if let Some(pattern) = self.filename_pattern {
            template.filename_pattern = pattern;
        }
        if let Some(filters) = self.filters {
            template.filters = filters;
        }

        let upload = match (self.template_file_name, self.template) {
            (Some(file_name), Some(content)) => match rename_label(template.kind, &file_name) {
                Ok(path) => {
                    template.label = path.clone();
                    Some(TemplateUpload { path, content })
                }
                Err(e) => {
                    errors.add("template_file_name", e);
                    None
                }
            },
            (None, Some(content)) => Some(TemplateUpload {
                path: template.label.clone(),
                content,
            }),
            (Some(_), None) => {
                let mut err = ValidationError::new("required");
                err.message = Some("Envie o conteúdo do novo template junto com o nome do arquivo.".into());
                errors.add("template", err);
                None
            }
            (None, None) => None,
        };

        if let Err(record_errors) = template.full_clean() {
            for (field, field_errors) in record_errors.field_errors() {
                for e in field_errors {
                    errors.add(field_name(&field), e.clone());
                }
            }
        }

        if !errors.errors().is_empty() {
            return Err(errors);
        }

        template.updated_at = Utc::now();
        Ok(upload)
    }
}

fn clearable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(Some(value.filter(|v| !v.trim().is_empty())))
}

// Os nomes de campo do `ValidationErrors` precisam ser 'static.
fn field_name(field: &str) -> &'static str {
    match field {
        "name" => "name",
        "description" => "description",
        "label" => "label",
        "width" => "width",
        "height" => "height",
        "filename_pattern" => "filename_pattern",
        "filters" => "filters",
        _ => "__all__",
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MetadataPayload {
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
}


#[cfg(test)]
mod tests {
    use super::fixtures::template;
    use super::*;
    use crate::models::inventory::fixtures as inventory;

    fn create_payload(file_name: &str) -> CreateLabelPayload {
        CreateLabelPayload {
            name: "QR".into(),
            description: None,
            template_file_name: file_name.into(),
            template: "<p>{{ item.pk }}</p>".into(),
            enabled: None,
            width: None,
            height: None,
            filename_pattern: None,
            filters: None,
            metadata: None,
        }
    }

    #[test]
    fn rename_label_keeps_only_the_base_name() {
        assert_eq!(
            rename_label(LabelKind::StockItem, "../../etc/evil.html").unwrap(),
            "label/template/stockitem/evil.html"
        );
        assert_eq!(
            rename_label(LabelKind::BuildLine, "C:\\labels\\line.html").unwrap(),
            "label/template/buildline/line.html"
        );
        assert!(rename_label(LabelKind::Part, "labels/").is_err());
        assert!(rename_label(LabelKind::Part, "..").is_err());
    }

    #[test]
    fn txt_upload_is_rejected_and_html_is_accepted() {
        let err = create_payload("label.txt").into_template(LabelKind::Part).unwrap_err();
        assert!(err.field_errors().contains_key("template_file_name"));

        let (record, upload) = create_payload("label.html").into_template(LabelKind::Part).unwrap();
        assert_eq!(record.label, "label/template/part/label.html");
        assert_eq!(upload.path, record.label);
        assert_eq!(record.width, DEFAULT_WIDTH_MM);
        assert_eq!(record.height, DEFAULT_HEIGHT_MM);
        assert_eq!(record.filename_pattern, "label.pdf");
        assert!(record.enabled);
    }

    #[test]
    fn dimensions_below_two_millimetres_fail_validation() {
        let mut label = template(LabelKind::StockItem);
        label.width = 1.5;
        let err = label.full_clean().unwrap_err();
        assert!(err.field_errors().contains_key("width"));

        let mut label = template(LabelKind::StockItem);
        label.height = 0.0;
        let err = label.full_clean().unwrap_err();
        assert!(err.field_errors().contains_key("height"));

        let mut label = template(LabelKind::StockItem);
        label.width = 2.0;
        label.height = 2.0;
        assert!(label.full_clean().is_ok());
    }

    #[test]
    fn filters_are_validated_against_the_kind() {
        let mut label = template(LabelKind::StockLocation);
        label.filters = "part__IPN=IPN-001".into();
        let err = label.full_clean().unwrap_err();
        assert!(err.field_errors().contains_key("filters"));

        let mut label = template(LabelKind::StockItem);
        label.filters = "part__IPN=IPN-001".into();
        assert!(label.full_clean().is_ok());
    }

    #[test]
    fn per_kind_validators_use_their_entity() {
        assert!(validate_stock_item_filters("serial=1").is_ok());
        assert!(validate_stock_location_filters("serial=1").is_err());
        assert!(validate_part_filters("IPN=A,category__name=Resistors").is_ok());
        assert!(validate_build_line_filters("bom_item__sub_part__IPN=A").is_ok());
        assert!(validate_build_line_filters("serial=1").is_err());
    }

    #[test]
    fn update_rejects_bad_values_without_touching_other_fields() {
        let mut label = template(LabelKind::Part);
        let payload = UpdateLabelPayload {
            height: Some(1.0),
            ..Default::default()
        };
        let err = payload.apply(&mut label).unwrap_err();
        assert!(err.field_errors().contains_key("height"));
    }

    #[test]
    fn update_with_new_content_overwrites_the_same_file() {
        let mut label = template(LabelKind::Part);
        let payload = UpdateLabelPayload {
            template: Some("<b>new</b>".into()),
            ..Default::default()
        };
        let upload = payload.apply(&mut label).unwrap().unwrap();
        assert_eq!(upload.path, "label/template/part/test.html");
    }

    #[test]
    fn update_clears_the_description_with_null_or_blank() {
        let mut label = template(LabelKind::Part);
        let payload: UpdateLabelPayload = serde_json::from_value(serde_json::json!({ "name": "Novo" })).unwrap();
        payload.apply(&mut label).unwrap();
        assert_eq!(label.description.as_deref(), Some("A label for tests"));

        let payload: UpdateLabelPayload = serde_json::from_value(serde_json::json!({ "description": null })).unwrap();
        payload.apply(&mut label).unwrap();
        assert_eq!(label.description, None);

        let mut label = template(LabelKind::Part);
        let payload: UpdateLabelPayload = serde_json::from_value(serde_json::json!({ "description": "  " })).unwrap();
        payload.apply(&mut label).unwrap();
        assert_eq!(label.description, None);

        let payload: UpdateLabelPayload = serde_json::from_value(serde_json::json!({ "description": "Outra" })).unwrap();
        payload.apply(&mut label).unwrap();
        assert_eq!(label.description.as_deref(), Some("Outra"));
    }

    #[test]
    fn update_file_name_requires_content() {
        let mut label = template(LabelKind::Part);
        let payload = UpdateLabelPayload {
            template_file_name: Some("other.html".into()),
            ..Default::default()
        };
        let err = payload.apply(&mut label).unwrap_err();
        assert!(err.field_errors().contains_key("template"));
    }

    #[test]
    fn template_name_resolves_under_media_root() {
        let label = template(LabelKind::StockItem);
        let path = label.template_name(Path::new("/srv/media"));
        assert_eq!(path, Path::new("/srv/media/label/template/stockitem/test.html"));
    }

    #[test]
    fn display_shows_name_and_description() {
        assert_eq!(template(LabelKind::Part).to_string(), "Test label - A label for tests");
    }

    #[test]
    fn applies_to_checks_every_object() {
        let mut label = template(LabelKind::StockItem);
        label.filters = "part__IPN=IPN-001".into();

        let item = PrintObject::StockItem(inventory::stock_item());
        assert!(label.applies_to(std::slice::from_ref(&item)));

        let mut other = inventory::stock_item();
        other.part.ipn = Some("IPN-999".into());
        assert!(!label.applies_to(&[item, PrintObject::StockItem(other)]));
    }

    #[test]
    fn api_slugs_round_trip() {
        for kind in LabelKind::ALL {
            assert_eq!(LabelKind::from_api_slug(kind.api_slug()), Some(kind));
        }
        assert_eq!(LabelKind::from_api_slug("order"), None);
    }
}
