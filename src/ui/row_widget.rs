// Row widget for displaying a horizontal row of gallery tiles
// Reusable slots with placeholder textures; tiles resolve through the
// shared image pipeline as fetches complete.

use gdk4::Texture;
use glib::Object;
use gtk4::prelude::*;
use gtk4::subclass::prelude::*;
use gtk4::{gdk, glib, Align, Box as GtkBox, ContentFit, GestureClick, Orientation, Picture};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use crate::images::{FetchKind, ImagePipeline};
use crate::models::RowModel;

/// Gap between tiles; must match the layout's gap so rows fill exactly.
pub const TILE_GAP: i32 = 12;

// Placeholder texture - generated once and reused
fn placeholder_texture() -> &'static Texture {
    static PLACEHOLDER: OnceLock<Texture> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        // Warm light gray, matching the studio site's empty tiles (64x64)
        let width = 64;
        let height = 64;
        let mut pixels = vec![0u8; width * height * 4];

        for chunk in pixels.chunks_exact_mut(4) {
            chunk[0] = 0xee; // R
            chunk[1] = 0xec; // G
            chunk[2] = 0xe9; // B
            chunk[3] = 0xff; // A
        }

        let bytes = glib::Bytes::from_owned(pixels);
        gdk::MemoryTexture::new(
            width as i32,
            height as i32,
            gdk::MemoryFormat::R8g8b8a8,
            &bytes,
            width * 4,
        )
        .upcast()
    })
}

static NEXT_LOAD_TOKEN: AtomicU64 = AtomicU64::new(1);

#[derive(Clone)]
struct TileWaiter {
    widget: glib::WeakRef<GalleryRow>,
    slot: usize,
    token: u64,
}

/// Routes completed tile fetches back to whichever row slots still wait
/// for them. Rows register at bind time; a slot that was re-bound in the
/// meantime rejects the stale texture by token.
pub struct TileLoader {
    pipeline: Rc<ImagePipeline>,
    waiters: RefCell<HashMap<String, Vec<TileWaiter>>>,
}

impl TileLoader {
    pub fn new(pipeline: Rc<ImagePipeline>) -> Rc<Self> {
        Rc::new(Self {
            pipeline,
            waiters: RefCell::new(HashMap::new()),
        })
    }

    fn request(&self, row: &GalleryRow, slot: usize, url: &str, token: u64) {
        if let Some(cached) = self.pipeline.cached(url, FetchKind::Tile) {
            row.apply_async_texture(slot, token, url, Some(&cached.texture));
            return;
        }

        self.waiters
            .borrow_mut()
            .entry(url.to_string())
            .or_default()
            .push(TileWaiter {
                widget: row.downgrade(),
                slot,
                token,
            });
        self.pipeline.request(url, FetchKind::Tile);
    }

    /// Called from the main loop when a tile fetch completes.
    pub fn on_texture_ready(&self, url: &str, texture: Option<&Texture>) {
        let waiters = self.waiters.borrow_mut().remove(url).unwrap_or_default();
        for waiter in waiters {
            if let Some(row) = waiter.widget.upgrade() {
                row.apply_async_texture(waiter.slot, waiter.token, url, texture);
            }
        }
    }
}

// GObject subclass for GalleryRow
mod imp {
    use super::*;

    /// A single reusable tile slot.
    pub struct TileSlot {
        pub picture: Picture,
    }

    #[derive(Default)]
    pub struct GalleryRowInner {
        pub slots: RefCell<Vec<TileSlot>>,
        pub load_tokens: RefCell<Vec<u64>>,
        pub item_urls: RefCell<Vec<String>>,
        pub item_indices: RefCell<Vec<usize>>,
        pub row_index: Cell<u32>,
        pub on_item_activated: RefCell<Option<Rc<dyn Fn(usize)>>>,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for GalleryRowInner {
        const NAME: &'static str = "ObscuraGalleryRow";
        type Type = super::GalleryRow;
        type ParentType = GtkBox;
    }

    impl ObjectImpl for GalleryRowInner {
        fn constructed(&self) {
            self.parent_constructed();

            let obj = self.obj();
            obj.set_orientation(Orientation::Horizontal);
            obj.set_spacing(TILE_GAP);
            obj.set_homogeneous(false);
            obj.set_halign(Align::Start);
            obj.set_valign(Align::Start);
            obj.add_css_class("gallery-row");
        }
    }

    impl WidgetImpl for GalleryRowInner {}
    impl BoxImpl for GalleryRowInner {}
}

glib::wrapper! {
    pub struct GalleryRow(ObjectSubclass<imp::GalleryRowInner>)
        @extends GtkBox, gtk4::Widget,
        @implements gtk4::Accessible, gtk4::Buildable, gtk4::ConstraintTarget, gtk4::Orientable;
}

impl GalleryRow {
    pub fn new() -> Self {
        Object::builder().build()
    }

    /// Bind a RowModel to this widget, creating/updating tile slots as needed
    pub fn bind(&self, row_model: &RowModel, loader: &TileLoader) {
        let imp = self.imp();
        let items = &row_model.items;
        let row_height = row_model.height_px as i32;

        let mut slots = imp.slots.borrow_mut();
        let mut load_tokens = imp.load_tokens.borrow_mut();
        let mut urls = imp.item_urls.borrow_mut();
        let mut indices = imp.item_indices.borrow_mut();
        imp.row_index.set(row_model.row_index);

        // Ensure we have the right number of tile slots
        while slots.len() < items.len() {
            let slot = self.create_tile_slot(slots.len());
            self.append(&slot.picture);
            slots.push(slot);
            load_tokens.push(0);
        }

        // Hide extra slots if we have too many
        for (i, slot) in slots.iter().enumerate() {
            if i < items.len() {
                slot.picture.set_visible(true);
            } else {
                slot.picture.set_visible(false);
                load_tokens[i] = 0;
            }
        }

        urls.clear();
        indices.clear();
        urls.extend(items.iter().map(|item| item.url.clone()));
        indices.extend(items.iter().map(|item| item.image_index));

        let mut requests = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let slot = &slots[i];
            slot.picture
                .set_size_request(item.display_w as i32, row_height);
            slot.picture.set_tooltip_text(item.tooltip.as_deref());
            slot.picture.set_paintable(Some(placeholder_texture()));

            let token = NEXT_LOAD_TOKEN.fetch_add(1, Ordering::Relaxed);
            load_tokens[i] = token;
            requests.push((i, item.url.clone(), token));
        }

        // Release the bind-time borrows before asking the loader: a cached
        // tile resolves synchronously through apply_async_texture.
        drop(slots);
        drop(load_tokens);
        drop(urls);
        drop(indices);
        for (slot_index, url, token) in requests {
            loader.request(self, slot_index, &url, token);
        }
    }

    /// Unbind the current row model, preparing for reuse
    pub fn unbind(&self) {
        let imp = self.imp();
        for slot in imp.slots.borrow().iter() {
            slot.picture.set_paintable(Some(placeholder_texture()));
            slot.picture.set_visible(false);
        }
        for token in imp.load_tokens.borrow_mut().iter_mut() {
            *token = 0;
        }
        imp.item_urls.borrow_mut().clear();
        imp.item_indices.borrow_mut().clear();
    }

    fn apply_async_texture(
        &self,
        slot_index: usize,
        token: u64,
        expected_url: &str,
        texture: Option<&Texture>,
    ) {
        let Some(texture) = texture else {
            // Failed fetch: the placeholder stays, a later rebind retries.
            return;
        };
        let imp = self.imp();
        if imp.load_tokens.borrow().get(slot_index).copied() != Some(token) {
            return;
        }
        if imp.item_urls.borrow().get(slot_index).map(String::as_str) != Some(expected_url) {
            return;
        }
        if let Some(slot) = imp.slots.borrow().get(slot_index) {
            slot.picture.set_paintable(Some(texture));
        }
    }

    pub fn connect_item_activated<F>(&self, callback: F)
    where
        F: Fn(usize) + 'static,
    {
        *self.imp().on_item_activated.borrow_mut() = Some(Rc::new(callback));
    }

    fn create_tile_slot(&self, slot_index: usize) -> imp::TileSlot {
        let picture = Picture::new();
        // Allow the widget to shrink to the allocated size; otherwise large
        // images only render a clipped fragment.
        picture.set_can_shrink(true);
        picture.set_content_fit(ContentFit::Cover);
        picture.add_css_class("gallery-tile");

        let row_widget = self.clone();
        let click = GestureClick::new();
        click.set_button(1);
        click.connect_pressed(move |_, _n, _x, _y| {
            row_widget.emit_item_activated(slot_index);
        });
        picture.add_controller(click);

        imp::TileSlot { picture }
    }

    fn emit_item_activated(&self, slot_index: usize) {
        let imp = self.imp();
        let image_index = imp.item_indices.borrow().get(slot_index).copied();
        if let (Some(image_index), Some(callback)) =
            (image_index, imp.on_item_activated.borrow().as_ref())
        {
            callback(image_index);
        }
    }
}

impl Default for GalleryRow {
    fn default() -> Self {
        Self::new()
    }
}
