// src/services/pdf.rs

use std::path::{Path, PathBuf};

use genpdf::{elements, style, Element};
use image::Luma;
use qrcode::QrCode;
use serde::Serialize;

use crate::common::error::AppError;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// O documento final entregue ao cliente.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelDocument {
    pub filename: String,
    pub content_type: &'static str,
    pub attachment: bool,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl LabelDocument {
    pub fn content_disposition(&self) -> String {
        let kind = if self.attachment { "attachment" } else { "inline" };
        format!("{}; filename=\"{}\"", kind, self.filename.replace('"', ""))
    }
}

/// Tudo o que a conversão HTML -> PDF precisa saber.
/// Cada item de `pages` é o HTML de uma etiqueta (uma página).
#[derive(Debug, Clone)]
pub struct PdfJob<'a> {
    pub template_path: &'a Path,
    pub pages: Vec<String>,
    pub filename: String,
    pub base_url: &'a str,
    pub width_mm: f64,
    pub height_mm: f64,
    pub presentational_hints: bool,
}

/// Ponto de extensão para o motor de conversão HTML -> PDF.
pub trait PdfConverter: Send + Sync {
    fn convert(&self, job: &PdfJob<'_>) -> Result<Vec<u8>, AppError>;
}

// ---
// Implementação padrão com genpdf
// ---
/// Converte o HTML renderizado em um PDF do tamanho da etiqueta.
/// O genpdf não interpreta CSS: o texto de cada bloco vira um parágrafo e
/// os QR codes (`data-qr`) viram imagens.
#[derive(Debug, Clone)]
pub struct GenPdfConverter {
    fonts_dir: PathBuf,
    font_family: String,
}

impl GenPdfConverter {
    pub fn new(fonts_dir: impl Into<PathBuf>, font_family: impl Into<String>) -> Self {
        Self {
            fonts_dir: fonts_dir.into(),
            font_family: font_family.into(),
        }
    }
}

impl PdfConverter for GenPdfConverter {
    fn convert(&self, job: &PdfJob<'_>) -> Result<Vec<u8>, AppError> {
        // Carrega a fonte da pasta configurada (FONTS_DIR)
        let font_family = genpdf::fonts::from_files(&self.fonts_dir, &self.font_family, None)
            .map_err(|_| {
                AppError::FontNotFound(format!(
                    "Fonte '{}' não encontrada na pasta {}",
                    self.font_family,
                    self.fonts_dir.display()
                ))
            })?;

        let mut doc = genpdf::Document::new(font_family);
        doc.set_title(job.filename.clone());
        doc.set_paper_size(genpdf::Size::new(job.width_mm, job.height_mm));

        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(1);
        doc.set_page_decorator(decorator);

        for (index, page) in job.pages.iter().enumerate() {
            if index > 0 {
                doc.push(elements::PageBreak::new());
            }

            for block in extract_blocks(page) {
                match block {
                    HtmlBlock::Text(line) => {
                        doc.push(elements::Paragraph::new(line).styled(style::Style::new().with_font_size(7)));
                    }
                    HtmlBlock::Qr(data) => {
                        let code = QrCode::new(data.as_bytes())
                            .map_err(|e| AppError::PdfRender(e.to_string()))?;

                        // Renderiza para imagem
                        let image_buffer = code.render::<Luma<u8>>().build();
                        let dynamic_image = image::DynamicImage::ImageLuma8(image_buffer);

                        let pdf_image = elements::Image::from_dynamic_image(dynamic_image)
                            .map_err(|e| AppError::PdfRender(e.to_string()))?
                            .with_scale(genpdf::Scale::new(0.3, 0.3));

                        doc.push(pdf_image);
                    }
                }
            }
        }

        tracing::debug!(
            template = %job.template_path.display(),
            pages = job.pages.len(),
            "Gerando PDF da etiqueta"
        );

        // Renderiza para Buffer (Memória)
        let mut buffer = Vec::new();
        doc.render(&mut buffer)
            .map_err(|e| AppError::PdfRender(e.to_string()))?;

        Ok(buffer)
    }
}

/// Um bloco de conteúdo extraído do HTML da etiqueta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlBlock {
    Text(String),
    Qr(String),
}

// Tags cujo conteúdo nunca é impresso
const SKIPPED_TAGS: &[&str] = &["head", "style", "script", "title", "svg"];

// Tags que quebram a linha
const BLOCK_TAGS: &[&str] = &[
    "br", "p", "div", "tr", "li", "ul", "ol", "table", "h1", "h2", "h3", "h4", "h5", "h6", "hr",
    "body", "section",
];

/// Separa o HTML em linhas de texto e QR codes, na ordem do documento.
pub fn extract_blocks(html: &str) -> Vec<HtmlBlock> {
    let lower = html.to_ascii_lowercase();
    let mut blocks = Vec::new();
    let mut line = String::new();
    let mut pos = 0;

    while pos < html.len() {
        let rest = &html[pos..];

        if !rest.starts_with('<') {
            let next_tag = rest.find('<').unwrap_or(rest.len());
            push_text(&mut line, &decode_entities(&rest[..next_tag]));
            pos += next_tag;
            continue;
        }

        let Some(tag_len) = rest.find('>') else {
            // Tag sem fechamento: o resto é texto
            push_text(&mut line, &decode_entities(rest));
            break;
        };

        let tag = &rest[1..tag_len];
        let tag_end = pos + tag_len + 1;
        let closing = tag.starts_with('/');
        let name = tag_name(tag);

        if let Some(data) = attribute(tag, "data-qr") {
            flush(&mut line, &mut blocks);
            blocks.push(HtmlBlock::Qr(decode_entities(&data)));
        }

        if !closing && SKIPPED_TAGS.contains(&name.as_str()) {
            let end_marker = format!("</{}", name);
            pos = match lower[tag_end..].find(&end_marker) {
                Some(offset) => {
                    let close_start = tag_end + offset;
                    lower[close_start..]
                        .find('>')
                        .map(|gt| close_start + gt + 1)
                        .unwrap_or(html.len())
                }
                None => html.len(),
            };
            continue;
        }

        if BLOCK_TAGS.contains(&name.as_str()) {
            flush(&mut line, &mut blocks);
        } else if name == "td" || name == "th" {
            push_text(&mut line, " ");
        }

        pos = tag_end;
    }

    flush(&mut line, &mut blocks);
    blocks
}

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('/')
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn attribute(tag: &str, name: &str) -> Option<String> {
    let marker = format!("{}=\"", name);
    let start = tag.find(&marker)? + marker.len();
    let end = tag[start..].find('"')?;
    Some(tag[start..start + end].to_string())
}

// Acrescenta texto à linha atual, colapsando espaços em branco.
fn push_text(line: &mut String, text: &str) {
    for c in text.chars() {
        if c.is_whitespace() {
            if !line.is_empty() && !line.ends_with(' ') {
                line.push(' ');
            }
        } else {
            line.push(c);
        }
    }
}

fn flush(line: &mut String, blocks: &mut Vec<HtmlBlock>) {
    let text = line.trim();
    if !text.is_empty() {
        blocks.push(HtmlBlock::Text(text.to_string()));
    }
    line.clear();
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&#x2f;", "/")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_lines_from_block_tags() {
        let html = "<html><head><style>p { color: red; }</style></head>\
                    <body><h1>Widget</h1><p>IPN:  IPN-001<br>Qty: 5</p></body></html>";

        assert_eq!(
            extract_blocks(html),
            vec![
                HtmlBlock::Text("Widget".into()),
                HtmlBlock::Text("IPN: IPN-001".into()),
                HtmlBlock::Text("Qty: 5".into()),
            ]
        );
    }

    #[test]
    fn qr_blocks_replace_inline_svg() {
        let html = "<p>Part</p><div class=\"qrcode\" data-qr=\"{&quot;part&quot;: 10}\">\
                    <svg><rect width=\"1\"/></svg></div><p>End</p>";

        assert_eq!(
            extract_blocks(html),
            vec![
                HtmlBlock::Text("Part".into()),
                HtmlBlock::Qr("{\"part\": 10}".into()),
                HtmlBlock::Text("End".into()),
            ]
        );
    }

    #[test]
    fn table_cells_are_joined_with_spaces() {
        let html = "<table><tr><td>A</td><td>B</td></tr><tr><td>C</td></tr></table>";
        assert_eq!(
            extract_blocks(html),
            vec![HtmlBlock::Text("A B".into()), HtmlBlock::Text("C".into())]
        );
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(
            extract_blocks("<p>R&amp;D &lt;1&gt;</p>"),
            vec![HtmlBlock::Text("R&D <1>".into())]
        );
    }

    #[test]
    fn content_disposition_marks_attachment() {
        let doc = LabelDocument {
            filename: "label.pdf".into(),
            content_type: PDF_CONTENT_TYPE,
            attachment: true,
            bytes: Vec::new(),
        };
        assert_eq!(doc.content_disposition(), "attachment; filename=\"label.pdf\"");
    }

    #[test]
    fn missing_fonts_are_reported() {
        let converter = GenPdfConverter::new("/nonexistent/fonts", "Roboto");
        let job = PdfJob {
            template_path: Path::new("label.html"),
            pages: vec!["<p>x</p>".into()],
            filename: "label.pdf".into(),
            base_url: "http://localhost",
            width_mm: 50.0,
            height_mm: 20.0,
            presentational_hints: true,
        };
        assert!(matches!(converter.convert(&job), Err(AppError::FontNotFound(_))));
    }
}
