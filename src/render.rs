//! Serialising an assembled [`Document`] to bytes.
//!
//! [`DocumentRenderer`] is the seam to whatever produces the final file.
//! [`PdfRenderer`] is the built-in implementation, writing PDF 1.5 with
//! `lopdf`:
//!
//! - each transcoded JPEG is embedded once, untouched, as a `DCTDecode`
//!   image XObject;
//! - text uses the standard Helvetica / Helvetica-Bold Type1 fonts with
//!   WinAnsi encoding, so no font files are embedded;
//! - content streams are Flate-compressed.

use crate::assemble::{Document, Element, Rect};
use crate::error::BrochureError;
use crate::model::EncodedImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream, StringFormat};
use tracing::debug;

/// Turns an assembled document into output bytes.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, document: &Document) -> Result<Vec<u8>, BrochureError>;
}

const FONT_REGULAR: &str = "F1";
const FONT_BOLD: &str = "F2";

/// PDF renderer backed by `lopdf`.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    producer: String,
    compress: bool,
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self {
            producer: format!("listing-brochure {}", env!("CARGO_PKG_VERSION")),
            compress: true,
        }
    }
}

impl PdfRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave content streams uncompressed (handy when inspecting output).
    pub fn uncompressed(mut self) -> Self {
        self.compress = false;
        self
    }
}

impl DocumentRenderer for PdfRenderer {
    fn render(&self, document: &Document) -> Result<Vec<u8>, BrochureError> {
        let page_height = document.geometry.height as f32;
        let mut pdf = lopdf::Document::with_version("1.5");
        let pages_id = pdf.new_object_id();

        let regular = pdf.add_object(type1_font("Helvetica"));
        let bold = pdf.add_object(type1_font("Helvetica-Bold"));

        let mut xobjects = Dictionary::new();
        for (i, image) in document.images.iter().enumerate() {
            let id = pdf.add_object(jpeg_xobject(image));
            xobjects.set(image_name(i), id);
        }

        let resources_id = pdf.add_object(dictionary! {
            "Font" => dictionary! {
                FONT_REGULAR => regular,
                FONT_BOLD => bold,
            },
            "XObject" => xobjects,
        });

        let mut kids: Vec<Object> = Vec::with_capacity(document.pages.len());
        for page in &document.pages {
            let operations: Vec<Operation> = page
                .elements
                .iter()
                .flat_map(|element| element_operations(element, page_height))
                .collect();
            let content = Content { operations };
            let encoded = content
                .encode()
                .map_err(|e| BrochureError::RenderFailed(format!("content stream: {e}")))?;
            let content_id = pdf.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = pdf.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                (document.geometry.width as i64).into(),
                (document.geometry.height as i64).into(),
            ],
        };
        pdf.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        };
        if let Some(ref lang) = document.lang {
            catalog.set("Lang", Object::string_literal(lang.as_str()));
        }
        let catalog_id: ObjectId = pdf.add_object(catalog);
        let info_id = pdf.add_object(dictionary! {
            "Producer" => Object::string_literal(self.producer.as_str()),
        });
        pdf.trailer.set("Root", catalog_id);
        pdf.trailer.set("Info", info_id);

        if self.compress {
            pdf.compress();
        }

        let mut bytes = Vec::new();
        pdf.save_to(&mut bytes)
            .map_err(|e| BrochureError::RenderFailed(format!("serialising PDF: {e}")))?;
        debug!(
            "Rendered {} pages, {} images, {} bytes",
            document.pages.len(),
            document.images.len(),
            bytes.len()
        );
        Ok(bytes)
    }
}

fn type1_font(base: &str) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    }
}

fn image_name(index: usize) -> String {
    format!("Im{index}")
}

/// The JPEG goes in as-is; the PDF viewer does the decoding.
fn jpeg_xobject(image: &EncodedImage) -> Stream {
    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => image.width as i64,
        "Height" => image.height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "DCTDecode",
    };
    Stream::new(dict, image.bytes.clone()).with_compression(false)
}

fn element_operations(element: &Element, page_height: f32) -> Vec<Operation> {
    match element {
        Element::Image { image, frame, draw } => {
            let clip = to_pdf(frame, page_height);
            let target = to_pdf(draw, page_height);
            vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "re",
                    vec![clip.x.into(), clip.y.into(), clip.width.into(), clip.height.into()],
                ),
                Operation::new("W", vec![]),
                Operation::new("n", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        target.width.into(),
                        0.into(),
                        0.into(),
                        target.height.into(),
                        target.x.into(),
                        target.y.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(image_name(*image).into_bytes())]),
                Operation::new("Q", vec![]),
            ]
        }
        Element::Text {
            text,
            x,
            y,
            size,
            bold,
            gray,
        } => {
            let font = if *bold { FONT_BOLD } else { FONT_REGULAR };
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(font.as_bytes().to_vec()), (*size).into()]),
                Operation::new("g", vec![(*gray).into()]),
                Operation::new("Td", vec![(*x).into(), (page_height - *y).into()]),
                Operation::new(
                    "Tj",
                    vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
                ),
                Operation::new("ET", vec![]),
            ]
        }
    }
}

/// Flip a top-left-origin rect into PDF's bottom-left origin.
fn to_pdf(rect: &Rect, page_height: f32) -> Rect {
    Rect {
        x: rect.x,
        y: page_height - rect.y - rect.height,
        width: rect.width,
        height: rect.height,
    }
}

/// Encode `text` for a WinAnsiEncoding font. Unmappable characters become `?`.
///
/// `lopdf::Document::encode_text` drops unmappable characters instead, which
/// silently shortens titles and values; the table below keeps a visible marker.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(win_ansi_byte).collect()
}

fn win_ansi_byte(c: char) -> u8 {
    match c {
        ' '..='~' => c as u8,
        '\u{A0}'..='\u{FF}' => c as u32 as u8,
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => b'?',
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::DocumentAssembler;
    use crate::layout::PageGeometry;
    use crate::model::{BatchResult, DisplayField, ItemResult, SourceItem};
    use crate::pipeline::transcode::ImageTranscoder;
    use crate::config::TranscodePreset;

    fn tiny_jpeg() -> EncodedImage {
        let png = {
            let img = image::RgbImage::from_pixel(8, 6, image::Rgb([200, 40, 40]));
            let mut buf = std::io::Cursor::new(Vec::new());
            image::DynamicImage::ImageRgb8(img)
                .write_to(&mut buf, image::ImageFormat::Png)
                .unwrap();
            buf.into_inner()
        };
        ImageTranscoder::new()
            .transcode_blocking(&png, TranscodePreset::GALLERY)
            .unwrap()
    }

    #[test]
    fn renders_one_pdf_page_per_document_page() {
        let items = vec![
            SourceItem {
                title: Some("Attic studio".into()),
                fields: vec![DisplayField::new("Rooms", "2")],
                locale: Some("pt-PT".into()),
                ..Default::default()
            },
            SourceItem::default(),
        ];
        let batch = BatchResult {
            items: vec![
                ItemResult::Ready {
                    cover: Some(tiny_jpeg()),
                    gallery: vec![tiny_jpeg(), tiny_jpeg()],
                },
                ItemResult::Ready {
                    cover: None,
                    gallery: vec![],
                },
            ],
        };
        let doc = DocumentAssembler::new(PageGeometry::A4_PORTRAIT)
            .assemble(&items, batch)
            .unwrap();

        let bytes = PdfRenderer::new().render(&doc).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let parsed = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), 4);
    }

    #[test]
    fn empty_document_still_renders() {
        let doc = DocumentAssembler::new(PageGeometry::A4_PORTRAIT)
            .assemble(&[], BatchResult::default())
            .unwrap();
        let bytes = PdfRenderer::new().uncompressed().render(&doc).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn page_content_clips_images_and_draws_text() {
        let items = vec![SourceItem {
            title: Some("Harbour view".into()),
            ..Default::default()
        }];
        let batch = BatchResult {
            items: vec![ItemResult::Ready {
                cover: Some(tiny_jpeg()),
                gallery: vec![],
            }],
        };
        let doc = DocumentAssembler::new(PageGeometry::A4_PORTRAIT)
            .assemble(&items, batch)
            .unwrap();
        let bytes = PdfRenderer::new().uncompressed().render(&doc).unwrap();

        let parsed = lopdf::Document::load_mem(&bytes).unwrap();
        let pages: Vec<_> = parsed.get_pages().into_values().collect();
        let operators = |page: ObjectId| -> Vec<String> {
            let raw = parsed.get_page_content(page).unwrap();
            Content::decode(&raw)
                .unwrap()
                .operations
                .into_iter()
                .map(|op| op.operator)
                .collect()
        };

        let cover_page = operators(pages[0]);
        for op in ["q", "re", "W", "n", "cm", "Do", "Q"] {
            assert!(cover_page.iter().any(|o| o == op), "missing {op}");
        }
        assert!(operators(pages[1]).iter().any(|o| o == "Tj"));
    }

    #[test]
    fn win_ansi_maps_latin_and_punctuation() {
        assert_eq!(encode_win_ansi("Café"), vec![b'C', b'a', b'f', 0xE9]);
        assert_eq!(encode_win_ansi("€5…"), vec![0x80, b'5', 0x85]);
        assert_eq!(encode_win_ansi("日本"), b"??".to_vec());
    }

    #[test]
    fn rects_flip_to_bottom_left_origin() {
        let r = to_pdf(&Rect::new(20.0, 20.0, 100.0, 50.0), 842.0);
        assert_eq!(r, Rect::new(20.0, 772.0, 100.0, 50.0));
    }
}
