//! Page assembly: transcoded images and fields placed on a page model.
//!
//! The output [`Document`] is renderer-neutral. Coordinates are absolute PDF
//! points with the origin at the top-left of the page and y growing down;
//! each [`DocumentRenderer`](crate::render::DocumentRenderer) maps them to
//! its own coordinate system.
//!
//! Every listing becomes exactly two pages, in input order:
//!
//! 1. cover across the top of the content box, then the gallery grid;
//! 2. optional title line, then the fields in three columns.

use crate::error::BrochureError;
use crate::layout::{
    cover_grid_plan, field_page_plan, grid_cells, CoverGridPlan, FieldPagePlan, PageGeometry,
};
use crate::model::{BatchResult, EncodedImage, ItemResult, SourceItem};
use tracing::{debug, warn};

pub const TITLE_FONT_SIZE: f32 = 16.0;
pub const LABEL_FONT_SIZE: f32 = 8.0;
pub const VALUE_FONT_SIZE: f32 = 10.0;

/// Mid-grey used for field labels.
const LABEL_GRAY: f32 = 0.45;

/// A rectangle in page space (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Scale `(w, h)` to cover this rect entirely, centred.
    ///
    /// The result overflows the rect on one axis; renderers clip to `self`.
    pub fn cover_fit(&self, w: u32, h: u32) -> Rect {
        let (w, h) = (w.max(1) as f32, h.max(1) as f32);
        let scale = (self.width / w).max(self.height / h);
        let (dw, dh) = (w * scale, h * scale);
        Rect {
            x: self.x + (self.width - dw) / 2.0,
            y: self.y + (self.height - dh) / 2.0,
            width: dw,
            height: dh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    CoverGrid,
    Fields,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// `image` indexes [`Document::images`]. The image is drawn into `draw`
    /// and clipped to `frame`.
    Image { image: usize, frame: Rect, draw: Rect },
    /// Single line of text; `y` is the baseline.
    Text {
        text: String,
        x: f32,
        y: f32,
        size: f32,
        bold: bool,
        gray: f32,
    },
}

#[derive(Debug, Clone)]
pub struct Page {
    /// 0-based listing this page belongs to.
    pub item: usize,
    pub kind: PageKind,
    pub elements: Vec<Element>,
}

/// Renderer-neutral brochure.
#[derive(Debug, Clone)]
pub struct Document {
    pub geometry: PageGeometry,
    /// Language tag for document metadata.
    pub lang: Option<String>,
    pub images: Vec<EncodedImage>,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Places a fully-ready batch onto pages.
#[derive(Debug, Clone)]
pub struct DocumentAssembler {
    geometry: PageGeometry,
    grid: CoverGridPlan,
}

impl DocumentAssembler {
    pub fn new(geometry: PageGeometry) -> Self {
        Self {
            grid: cover_grid_plan(&geometry),
            geometry,
        }
    }

    /// Build the two-page block for every item.
    ///
    /// `batch` must be index-aligned with `items` and contain only
    /// [`ItemResult::Ready`]; anything else is an internal error, since a
    /// failed batch never reaches assembly.
    pub fn assemble(&self, items: &[SourceItem], batch: BatchResult) -> Result<Document, BrochureError> {
        if batch.len() != items.len() {
            return Err(BrochureError::Internal(format!(
                "batch has {} results for {} items",
                batch.len(),
                items.len()
            )));
        }

        let mut doc = Document {
            geometry: self.geometry,
            lang: items.iter().find_map(|i| i.locale.clone()),
            images: Vec::with_capacity(batch.image_count()),
            pages: Vec::with_capacity(items.len() * 2),
        };

        for (index, (item, result)) in items.iter().zip(batch.items).enumerate() {
            let (cover, gallery) = match result {
                ItemResult::Ready { cover, gallery } => (cover, gallery),
                ItemResult::Aborted(reason) => {
                    return Err(BrochureError::Internal(format!(
                        "assembly reached aborted listing #{}: {reason}",
                        index + 1
                    )));
                }
            };
            let page = self.cover_grid_page(index, cover, gallery, &mut doc.images);
            doc.pages.push(page);
            doc.pages.push(self.fields_page(index, item));
        }

        debug!("Assembled {} pages, {} images", doc.pages.len(), doc.images.len());
        Ok(doc)
    }

    fn cover_grid_page(
        &self,
        item: usize,
        cover: Option<EncodedImage>,
        gallery: Vec<EncodedImage>,
        images: &mut Vec<EncodedImage>,
    ) -> Page {
        let pad = self.geometry.padding as f32;
        let mut elements = Vec::with_capacity(1 + gallery.len());

        if let Some(cover) = cover {
            let frame = Rect::new(
                pad,
                pad,
                self.grid.content_width as f32,
                self.grid.cover_height as f32,
            );
            elements.push(place(frame, cover, images));
        }

        for (cell, image) in grid_cells(gallery.len(), &self.grid).into_iter().zip(gallery) {
            let size = cell.size as f32;
            let frame = Rect::new(pad + cell.x as f32, pad + cell.y as f32, size, size);
            elements.push(place(frame, image, images));
        }

        Page {
            item,
            kind: PageKind::CoverGrid,
            elements,
        }
    }

    fn fields_page(&self, item: usize, source: &SourceItem) -> Page {
        let pad = self.geometry.padding as f32;
        let title = source.visible_title();
        let plan: FieldPagePlan = field_page_plan(&self.geometry, title.is_some());
        let mut elements = Vec::new();

        if let Some(title) = title {
            elements.push(Element::Text {
                text: fit_text(title, self.geometry.content_width() as f32, TITLE_FONT_SIZE),
                x: pad,
                y: pad + TITLE_FONT_SIZE + 2.0,
                size: TITLE_FONT_SIZE,
                bold: true,
                gray: 0.0,
            });
        }

        let fields = if source.fields.len() > plan.max_fields() {
            warn!(
                "Listing #{} has {} fields; only {} fit on the page",
                item + 1,
                source.fields.len(),
                plan.max_fields()
            );
            &source.fields[..plan.max_fields()]
        } else {
            &source.fields[..]
        };

        let width = plan.column_width as f32;
        for (i, field) in fields.iter().enumerate() {
            let (x, y) = plan.field_origin(i);
            let (x, y) = (pad + x as f32, pad + y as f32);
            elements.push(Element::Text {
                text: fit_text(&field.label, width, LABEL_FONT_SIZE),
                x,
                y: y + LABEL_FONT_SIZE + 2.0,
                size: LABEL_FONT_SIZE,
                bold: false,
                gray: LABEL_GRAY,
            });
            elements.push(Element::Text {
                text: fit_text(&field.value, width, VALUE_FONT_SIZE),
                x,
                y: y + LABEL_FONT_SIZE + VALUE_FONT_SIZE + 6.0,
                size: VALUE_FONT_SIZE,
                bold: true,
                gray: 0.0,
            });
        }

        Page {
            item,
            kind: PageKind::Fields,
            elements,
        }
    }
}

fn place(frame: Rect, image: EncodedImage, images: &mut Vec<EncodedImage>) -> Element {
    let draw = frame.cover_fit(image.width, image.height);
    images.push(image);
    Element::Image {
        image: images.len() - 1,
        frame,
        draw,
    }
}

/// Truncate `text` with an ellipsis so it fits `width` at `size`.
///
/// Uses Helvetica's average advance (about half an em); good enough to keep
/// columns from running into each other.
pub fn fit_text(text: &str, width: f32, size: f32) -> String {
    let text = text.trim();
    let advance = size * 0.55;
    let max_chars = (width / advance).floor().max(1.0) as usize;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AbortReason, MediaError};
    use crate::model::DisplayField;

    fn img(width: u32, height: u32) -> EncodedImage {
        EncodedImage {
            bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
            width,
            height,
            quality: 80,
        }
    }

    fn ready(cover: bool, gallery: usize) -> ItemResult {
        ItemResult::Ready {
            cover: cover.then(|| img(1600, 900)),
            gallery: (0..gallery).map(|i| img(600, 400 + i as u32)).collect(),
        }
    }

    fn images_on(page: &Page) -> usize {
        page.elements
            .iter()
            .filter(|e| matches!(e, Element::Image { .. }))
            .count()
    }

    fn texts_on(page: &Page) -> Vec<&str> {
        page.elements
            .iter()
            .filter_map(|e| match e {
                Element::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn two_pages_per_item_in_order() {
        let items = vec![SourceItem::default(); 3];
        let batch = BatchResult {
            items: vec![ready(true, 9), ready(false, 0), ready(true, 4)],
        };
        let doc = DocumentAssembler::new(PageGeometry::A4_PORTRAIT)
            .assemble(&items, batch)
            .unwrap();

        assert_eq!(doc.page_count(), 6);
        for (i, page) in doc.pages.iter().enumerate() {
            assert_eq!(page.item, i / 2);
            let kind = if i % 2 == 0 { PageKind::CoverGrid } else { PageKind::Fields };
            assert_eq!(page.kind, kind);
        }
        assert_eq!(images_on(&doc.pages[0]), 10);
        assert_eq!(images_on(&doc.pages[2]), 0);
        assert_eq!(images_on(&doc.pages[4]), 5);
        assert_eq!(doc.images.len(), 15);
    }

    #[test]
    fn gallery_keeps_reference_order() {
        let items = vec![SourceItem::default()];
        let doc = DocumentAssembler::new(PageGeometry::A4_PORTRAIT)
            .assemble(&items, BatchResult { items: vec![ready(false, 5)] })
            .unwrap();
        let heights: Vec<u32> = doc.images.iter().map(|i| i.height).collect();
        assert_eq!(heights, vec![400, 401, 402, 403, 404]);
    }

    #[test]
    fn cover_fills_its_frame() {
        let items = vec![SourceItem::default()];
        let doc = DocumentAssembler::new(PageGeometry::A4_PORTRAIT)
            .assemble(&items, BatchResult { items: vec![ready(true, 0)] })
            .unwrap();
        match &doc.pages[0].elements[0] {
            Element::Image { frame, draw, .. } => {
                assert_eq!(*frame, Rect::new(20.0, 20.0, 555.0, 264.0));
                assert!(draw.width >= frame.width - 0.01);
                assert!(draw.height >= frame.height - 0.01);
                // 16:9 into 555×264 overflows vertically, centred.
                assert!((draw.y + draw.height / 2.0 - (frame.y + frame.height / 2.0)).abs() < 0.01);
            }
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[test]
    fn title_is_omitted_not_blank() {
        let mut item = SourceItem {
            title: Some("Loft in Lisbon".into()),
            fields: vec![DisplayField::new("Price", "€450,000")],
            ..Default::default()
        };
        let assembler = DocumentAssembler::new(PageGeometry::A4_PORTRAIT);

        let doc = assembler
            .assemble(std::slice::from_ref(&item), BatchResult { items: vec![ready(false, 0)] })
            .unwrap();
        assert_eq!(texts_on(&doc.pages[1]), vec!["Loft in Lisbon", "Price", "€450,000"]);

        item.omit_title = true;
        let doc = assembler
            .assemble(std::slice::from_ref(&item), BatchResult { items: vec![ready(false, 0)] })
            .unwrap();
        assert_eq!(texts_on(&doc.pages[1]), vec!["Price", "€450,000"]);
        match &doc.pages[1].elements[0] {
            Element::Text { y, .. } => assert!(*y < 20.0 + TITLE_FONT_SIZE),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn fields_wrap_every_three() {
        let item = SourceItem {
            fields: (0..4).map(|i| DisplayField::new(format!("L{i}"), format!("V{i}"))).collect(),
            omit_title: true,
            ..Default::default()
        };
        let doc = DocumentAssembler::new(PageGeometry::A4_PORTRAIT)
            .assemble(std::slice::from_ref(&item), BatchResult { items: vec![ready(false, 0)] })
            .unwrap();
        let xs: Vec<(f32, f32)> = doc.pages[1]
            .elements
            .iter()
            .filter_map(|e| match e {
                Element::Text { text, x, y, .. } if text.starts_with('L') => Some((*x, *y)),
                _ => None,
            })
            .collect();
        assert_eq!(xs[0].0, 20.0);
        assert_eq!(xs[1].0, 20.0 + 189.0);
        assert_eq!(xs[2].0, 20.0 + 378.0);
        assert_eq!(xs[3].0, 20.0);
        assert!(xs[3].1 > xs[0].1);
    }

    #[test]
    fn aborted_item_is_an_internal_error() {
        let items = vec![SourceItem::default()];
        let batch = BatchResult {
            items: vec![ItemResult::Aborted(AbortReason::Cover {
                attempts: 3,
                error: MediaError::Cancelled,
            })],
        };
        let err = DocumentAssembler::new(PageGeometry::A4_PORTRAIT)
            .assemble(&items, batch)
            .unwrap_err();
        assert!(matches!(err, BrochureError::Internal(_)));
    }

    #[test]
    fn long_text_is_ellipsised() {
        let out = fit_text(&"x".repeat(200), 100.0, 10.0);
        assert!(out.ends_with('…'));
        assert_eq!(out.chars().count(), 18);
        assert_eq!(fit_text("  short  ", 100.0, 10.0), "short");
    }
}
