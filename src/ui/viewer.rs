// Full-screen image viewer overlay
// Renders whatever the Lightbox state machine says: the machine owns all
// zoom/pan/navigation rules, this shell owns widgets, gestures and the
// async texture loads for the current image and its neighbors.

use gdk4::{ModifierType, Texture};
use gtk4::gdk::Key;
use gtk4::prelude::*;
use gtk4::subclass::prelude::*;
use gtk4::{
    glib, Align, Box as GtkBox, Button, EventControllerKey, EventControllerScroll,
    EventControllerScrollFlags, Fixed, GestureClick, GestureDrag, GestureZoom, Label, Orientation,
    Overlay, Picture, Widget,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use crate::images::{FetchKind, ImagePipeline};
use crate::models::{GalleryImage, Lightbox};

/// Ignore tiny touchpad jitter deltas that cause direction flapping.
const SCROLL_DEADZONE: f64 = 0.02;
/// A press that travels less than this is a click, not a pan.
const CLICK_SLOP_PX: f64 = 4.0;

// GObject subclass for GalleryViewer
mod imp {
    use super::*;

    #[derive(Default)]
    pub struct GalleryViewerInner {
        // Root overlay container
        pub overlay: RefCell<Option<Overlay>>,
        // Fixed container for positioning the picture
        pub fixed: RefCell<Option<Fixed>>,
        // The picture widget displaying the image
        pub picture: RefCell<Option<Picture>>,
        // Chrome
        pub counter_label: RefCell<Option<Label>>,
        pub zoom_label: RefCell<Option<Label>>,
        pub loading_label: RefCell<Option<Label>>,
        pub prev_button: RefCell<Option<Button>>,
        pub next_button: RefCell<Option<Button>>,
        // The gesture state machine; single source of truth for
        // index/scale/offset
        pub machine: RefCell<Lightbox>,
        // URL whose texture the picture currently wants
        pub current_url: RefCell<Option<String>>,
        // Natural size of the decoded texture
        pub texture_width: Cell<u32>,
        pub texture_height: Cell<u32>,
        // Last applied transform, to skip redundant relayout work
        pub last_req_w: Cell<i32>,
        pub last_req_h: Cell<i32>,
        pub last_pos_x: Cell<f64>,
        pub last_pos_y: Cell<f64>,
        // Press position of a candidate backdrop click
        pub press_x: Cell<f64>,
        pub press_y: Cell<f64>,
        pub pipeline: RefCell<Option<Rc<ImagePipeline>>>,
        // Closure to call after the viewer closed
        pub on_close: RefCell<Option<Rc<dyn Fn()>>>,
    }

    #[glib::object_subclass]
    impl ObjectSubclass for GalleryViewerInner {
        const NAME: &'static str = "ObscuraGalleryViewer";
        type Type = super::GalleryViewer;
        type ParentType = glib::Object;
    }

    impl ObjectImpl for GalleryViewerInner {}
}

glib::wrapper! {
    pub struct GalleryViewer(ObjectSubclass<imp::GalleryViewerInner>);
}

impl GalleryViewer {
    pub fn new(pipeline: Rc<ImagePipeline>) -> Self {
        let obj: Self = glib::Object::builder().build();
        *obj.imp().pipeline.borrow_mut() = Some(pipeline);
        obj.setup_widgets();
        obj
    }

    /// Get the widget to add to the UI
    pub fn widget(&self) -> Widget {
        self.imp()
            .overlay
            .borrow()
            .as_ref()
            .expect("viewer widgets not set up")
            .clone()
            .upcast()
    }

    pub fn is_open(&self) -> bool {
        self.imp().machine.borrow().is_open()
    }

    pub fn connect_closed<F>(&self, callback: F)
    where
        F: Fn() + 'static,
    {
        *self.imp().on_close.borrow_mut() = Some(Rc::new(callback));
    }

    /// Open the viewer over `images` starting at `start`. Out-of-range
    /// input renders nothing and reports false.
    pub fn open(&self, images: Vec<GalleryImage>, start: usize) -> bool {
        let imp = self.imp();
        if !imp.machine.borrow_mut().open(images, start) {
            return false;
        }

        if let Some(overlay) = imp.overlay.borrow().as_ref() {
            overlay.set_visible(true);
            overlay.grab_focus();
        }
        self.load_current();
        self.update_chrome();

        // Allocation may not have happened yet; re-fit once it has.
        let viewer_weak = self.downgrade();
        glib::timeout_add_local_once(Duration::from_millis(32), move || {
            if let Some(viewer) = viewer_weak.upgrade() {
                if viewer.is_open() {
                    viewer.update_transform();
                }
            }
        });
        true
    }

    fn request_close(&self) {
        let imp = self.imp();
        if !imp.machine.borrow_mut().close() {
            return;
        }
        self.after_close();
    }

    fn backdrop_click(&self, x: f64, y: f64) {
        let imp = self.imp();
        // Clicks on the image itself never dismiss, even at scale 1.
        if self.point_on_picture(x, y) {
            return;
        }
        if !imp.machine.borrow_mut().background_click() {
            return;
        }
        self.after_close();
    }

    fn after_close(&self) {
        let imp = self.imp();
        if let Some(overlay) = imp.overlay.borrow().as_ref() {
            overlay.set_visible(false);
        }
        if let Some(picture) = imp.picture.borrow().as_ref() {
            picture.set_paintable(None::<&Texture>);
        }
        *imp.current_url.borrow_mut() = None;
        imp.texture_width.set(0);
        imp.texture_height.set(0);
        let on_close = imp.on_close.borrow().clone();
        if let Some(on_close) = on_close {
            on_close();
        }
    }

    fn navigate(&self, delta: i64) {
        if self.imp().machine.borrow_mut().navigate(delta) {
            self.load_current();
            self.update_chrome();
        }
    }

    fn point_on_picture(&self, x: f64, y: f64) -> bool {
        let imp = self.imp();
        let px = imp.last_pos_x.get();
        let py = imp.last_pos_y.get();
        if px.is_nan() || py.is_nan() {
            return false;
        }
        let w = imp.last_req_w.get() as f64;
        let h = imp.last_req_h.get() as f64;
        x >= px && x <= px + w && y >= py && y <= py + h
    }

    /// Start loading the image at the machine's current index and warm the
    /// cache for its neighbors.
    fn load_current(&self) {
        let imp = self.imp();
        let machine = imp.machine.borrow();
        let Some(image) = machine.current_image() else {
            return;
        };
        let url = image.url.clone();
        let neighbors: Vec<String> = machine
            .current_index()
            .map(|index| {
                [index.checked_sub(1), index.checked_add(1)]
                    .into_iter()
                    .flatten()
                    .filter_map(|i| machine.image_at(i))
                    .map(|img| img.url.clone())
                    .collect()
            })
            .unwrap_or_default();
        drop(machine);

        *imp.current_url.borrow_mut() = Some(url.clone());
        imp.texture_width.set(0);
        imp.texture_height.set(0);
        imp.last_req_w.set(-1);
        imp.last_req_h.set(-1);
        imp.last_pos_x.set(f64::NAN);
        imp.last_pos_y.set(f64::NAN);

        let pipeline = imp.pipeline.borrow().clone();
        let Some(pipeline) = pipeline else { return };

        if let Some(cached) = pipeline.cached(&url, FetchKind::Full) {
            self.apply_texture(&cached.texture, cached.width, cached.height);
        } else {
            if let Some(picture) = imp.picture.borrow().as_ref() {
                picture.set_paintable(None::<&Texture>);
            }
            self.set_loading(Some("Loading image..."));
            pipeline.request(&url, FetchKind::Full);
        }

        for neighbor in neighbors {
            pipeline.request(&neighbor, FetchKind::Full);
        }
    }

    /// Called from the main loop for every completed full-size fetch.
    /// Results for anything but the currently wanted URL only warm the
    /// cache and are ignored here.
    pub fn notify_image(&self, url: &str, texture: Option<&Texture>, width: u32, height: u32) {
        let imp = self.imp();
        if !self.is_open() || imp.current_url.borrow().as_deref() != Some(url) {
            return;
        }
        match texture {
            Some(texture) => self.apply_texture(texture, width, height),
            None => self.set_loading(Some("Could not load image")),
        }
    }

    fn apply_texture(&self, texture: &Texture, width: u32, height: u32) {
        let imp = self.imp();
        if let Some(picture) = imp.picture.borrow().as_ref() {
            picture.set_paintable(Some(texture));
        }
        imp.texture_width.set(width);
        imp.texture_height.set(height);
        self.set_loading(None);
        self.update_transform();
    }

    fn set_loading(&self, message: Option<&str>) {
        if let Some(label) = self.imp().loading_label.borrow().as_ref() {
            match message {
                Some(text) => {
                    label.set_text(text);
                    label.set_visible(true);
                }
                None => label.set_visible(false),
            }
        }
    }

    /// Push viewport and fitted-image sizes into the machine, then place
    /// the picture according to the machine's transform.
    fn update_transform(&self) {
        let imp = self.imp();
        let fixed = imp.fixed.borrow();
        let picture = imp.picture.borrow();
        let (Some(fixed), Some(picture)) = (fixed.as_ref(), picture.as_ref()) else {
            return;
        };

        let viewport_w = fixed.width() as f64;
        let viewport_h = fixed.height() as f64;
        if viewport_w <= 0.0 || viewport_h <= 0.0 {
            return;
        }

        let tex_w = imp.texture_width.get() as f64;
        let tex_h = imp.texture_height.get() as f64;
        if tex_w <= 0.0 || tex_h <= 0.0 {
            return;
        }

        // Fit to the viewport without upscaling beyond 1:1.
        let fit = (viewport_w / tex_w).min(viewport_h / tex_h).min(1.0);
        let base_w = (tex_w * fit).max(1.0);
        let base_h = (tex_h * fit).max(1.0);

        let (scale, offset) = {
            let mut machine = imp.machine.borrow_mut();
            machine.set_viewport(viewport_w, viewport_h);
            machine.set_image_size(base_w, base_h);
            (machine.scale(), machine.offset())
        };

        let scaled_w = base_w * scale;
        let scaled_h = base_h * scale;

        let req_w = scaled_w.round() as i32;
        let req_h = scaled_h.round() as i32;
        if req_w != imp.last_req_w.get() || req_h != imp.last_req_h.get() {
            picture.set_size_request(req_w, req_h);
            imp.last_req_w.set(req_w);
            imp.last_req_h.set(req_h);
        }

        let final_x = (viewport_w - scaled_w) / 2.0 + offset.x;
        let final_y = (viewport_h - scaled_h) / 2.0 + offset.y;

        let last_x = imp.last_pos_x.get();
        let last_y = imp.last_pos_y.get();
        if last_x.is_nan()
            || last_y.is_nan()
            || (final_x - last_x).abs() > 0.01
            || (final_y - last_y).abs() > 0.01
        {
            fixed.move_(picture, final_x, final_y);
            imp.last_pos_x.set(final_x);
            imp.last_pos_y.set(final_y);
        }
    }

    fn update_chrome(&self) {
        let imp = self.imp();
        let machine = imp.machine.borrow();

        if let Some(label) = imp.counter_label.borrow().as_ref() {
            match machine.current_index() {
                Some(index) => label.set_text(&format!("{} / {}", index + 1, machine.len())),
                None => label.set_text(""),
            }
        }
        if let Some(button) = imp.prev_button.borrow().as_ref() {
            button.set_sensitive(machine.can_navigate(-1));
        }
        if let Some(button) = imp.next_button.borrow().as_ref() {
            button.set_sensitive(machine.can_navigate(1));
        }
        if let Some(label) = imp.zoom_label.borrow().as_ref() {
            let scale = machine.scale();
            if machine.is_zoomed() {
                label.set_text(&format!("{}%", (scale * 100.0).round() as i64));
                label.set_visible(true);
            } else {
                label.set_visible(false);
            }
        }
    }

    /// Set up the viewer widgets
    fn setup_widgets(&self) {
        let imp = self.imp();

        let overlay = Overlay::new();
        overlay.set_hexpand(true);
        overlay.set_vexpand(true);
        overlay.add_css_class("viewer-overlay");
        overlay.set_visible(false);
        overlay.set_focusable(true);

        let fixed = Fixed::new();
        fixed.set_hexpand(true);
        fixed.set_vexpand(true);
        fixed.add_css_class("viewer-backdrop");

        let picture = Picture::new();
        picture.set_can_shrink(true);
        picture.set_content_fit(gtk4::ContentFit::Fill);
        picture.add_css_class("viewer-image");
        fixed.put(&picture, 0.0, 0.0);

        overlay.set_child(Some(&fixed));

        // Top bar: counter left, close right
        let top_bar = GtkBox::new(Orientation::Horizontal, 8);
        top_bar.set_valign(Align::Start);
        top_bar.set_hexpand(true);
        top_bar.set_margin_top(12);
        top_bar.set_margin_start(12);
        top_bar.set_margin_end(12);

        let counter_label = Label::new(None);
        counter_label.add_css_class("viewer-counter");
        top_bar.append(&counter_label);

        let spacer = GtkBox::new(Orientation::Horizontal, 0);
        spacer.set_hexpand(true);
        top_bar.append(&spacer);

        let close_button = Button::with_label("Close");
        close_button.add_css_class("viewer-button");
        top_bar.append(&close_button);
        overlay.add_overlay(&top_bar);

        // Edge navigation buttons
        let prev_button = Button::with_label("<");
        prev_button.add_css_class("viewer-button");
        prev_button.set_valign(Align::Center);
        prev_button.set_halign(Align::Start);
        prev_button.set_margin_start(12);
        overlay.add_overlay(&prev_button);

        let next_button = Button::with_label(">");
        next_button.add_css_class("viewer-button");
        next_button.set_valign(Align::Center);
        next_button.set_halign(Align::End);
        next_button.set_margin_end(12);
        overlay.add_overlay(&next_button);

        // Zoom indicator, shown only while zoomed
        let zoom_label = Label::new(None);
        zoom_label.add_css_class("viewer-zoom");
        zoom_label.set_valign(Align::End);
        zoom_label.set_halign(Align::Center);
        zoom_label.set_margin_bottom(16);
        zoom_label.set_visible(false);
        overlay.add_overlay(&zoom_label);

        // Loading / error text, centered
        let loading_label = Label::new(None);
        loading_label.add_css_class("viewer-loading");
        loading_label.set_valign(Align::Center);
        loading_label.set_halign(Align::Center);
        loading_label.set_visible(false);
        overlay.add_overlay(&loading_label);

        let viewer_weak = self.downgrade();
        close_button.connect_clicked(move |_| {
            if let Some(viewer) = viewer_weak.upgrade() {
                viewer.request_close();
            }
        });
        let viewer_weak = self.downgrade();
        prev_button.connect_clicked(move |_| {
            if let Some(viewer) = viewer_weak.upgrade() {
                viewer.navigate(-1);
            }
        });
        let viewer_weak = self.downgrade();
        next_button.connect_clicked(move |_| {
            if let Some(viewer) = viewer_weak.upgrade() {
                viewer.navigate(1);
            }
        });

        self.setup_gestures(&overlay, &fixed);
        self.setup_keyboard(&overlay);

        *imp.overlay.borrow_mut() = Some(overlay);
        *imp.fixed.borrow_mut() = Some(fixed);
        *imp.picture.borrow_mut() = Some(picture);
        *imp.counter_label.borrow_mut() = Some(counter_label);
        *imp.zoom_label.borrow_mut() = Some(zoom_label);
        *imp.loading_label.borrow_mut() = Some(loading_label);
        *imp.prev_button.borrow_mut() = Some(prev_button);
        *imp.next_button.borrow_mut() = Some(next_button);
    }

    /// Set up zoom, pan and backdrop-click gestures
    fn setup_gestures(&self, overlay: &Overlay, fixed: &Fixed) {
        // Pinch zoom on the overlay
        let zoom_gesture = GestureZoom::new();
        let viewer_weak = self.downgrade();
        zoom_gesture.connect_begin(move |_, _sequence| {
            if let Some(viewer) = viewer_weak.upgrade() {
                viewer.imp().machine.borrow_mut().pinch_begin();
            }
        });
        let viewer_weak = self.downgrade();
        zoom_gesture.connect_scale_changed(move |_gesture, ratio| {
            if let Some(viewer) = viewer_weak.upgrade() {
                viewer.imp().machine.borrow_mut().pinch_update(ratio);
                viewer.update_transform();
                viewer.update_chrome();
            }
        });
        let viewer_weak = self.downgrade();
        zoom_gesture.connect_end(move |_, _sequence| {
            if let Some(viewer) = viewer_weak.upgrade() {
                viewer.imp().machine.borrow_mut().pinch_end();
                viewer.update_transform();
                viewer.update_chrome();
            }
        });
        overlay.add_controller(zoom_gesture);

        // Drag pan with the left mouse button / single touch
        let drag_gesture = GestureDrag::new();
        drag_gesture.set_button(1);

        let viewer_weak = self.downgrade();
        drag_gesture.connect_drag_begin(move |_, _x, _y| {
            if let Some(viewer) = viewer_weak.upgrade() {
                viewer.imp().machine.borrow_mut().pan_begin();
            }
        });
        let viewer_weak = self.downgrade();
        drag_gesture.connect_drag_update(move |_, offset_x, offset_y| {
            if let Some(viewer) = viewer_weak.upgrade() {
                viewer
                    .imp()
                    .machine
                    .borrow_mut()
                    .pan_update(offset_x, offset_y);
                viewer.update_transform();
            }
        });
        let viewer_weak = self.downgrade();
        drag_gesture.connect_drag_end(move |_, _dx, _dy| {
            if let Some(viewer) = viewer_weak.upgrade() {
                viewer.imp().machine.borrow_mut().pan_end();
            }
        });
        overlay.add_controller(drag_gesture);

        // Backdrop click closes, but only from the un-zoomed state and only
        // when the press did not travel (a pan must never dismiss).
        let click = GestureClick::new();
        click.set_button(1);
        let viewer_weak = self.downgrade();
        click.connect_pressed(move |_, _n, x, y| {
            if let Some(viewer) = viewer_weak.upgrade() {
                let imp = viewer.imp();
                imp.press_x.set(x);
                imp.press_y.set(y);
            }
        });
        let viewer_weak = self.downgrade();
        click.connect_released(move |_, _n, x, y| {
            if let Some(viewer) = viewer_weak.upgrade() {
                let imp = viewer.imp();
                let dx = (x - imp.press_x.get()).abs();
                let dy = (y - imp.press_y.get()).abs();
                if dx < CLICK_SLOP_PX && dy < CLICK_SLOP_PX {
                    viewer.backdrop_click(x, y);
                }
            }
        });
        fixed.add_controller(click);

        // Ctrl + scroll wheel zooms in discrete 10% steps
        let scroll_controller = EventControllerScroll::new(EventControllerScrollFlags::VERTICAL);
        let viewer_weak = self.downgrade();
        scroll_controller.connect_scroll(move |controller, _dx, dy| {
            let Some(viewer) = viewer_weak.upgrade() else {
                return glib::Propagation::Proceed;
            };
            let state = controller.current_event_state();
            if !state.contains(ModifierType::CONTROL_MASK) {
                return glib::Propagation::Proceed;
            }
            if dy.abs() < SCROLL_DEADZONE {
                return glib::Propagation::Stop;
            }
            viewer.imp().machine.borrow_mut().wheel_zoom(dy < 0.0);
            viewer.update_transform();
            viewer.update_chrome();
            glib::Propagation::Stop
        });
        fixed.add_controller(scroll_controller);
    }

    /// Set up keyboard controls
    fn setup_keyboard(&self, overlay: &Overlay) {
        let key_controller = EventControllerKey::new();
        let viewer_weak = self.downgrade();

        key_controller.connect_key_pressed(move |_, key, _code, _state| {
            let Some(viewer) = viewer_weak.upgrade() else {
                return glib::Propagation::Proceed;
            };
            match key {
                Key::Escape => {
                    viewer.request_close();
                    glib::Propagation::Stop
                }
                Key::Left => {
                    viewer.navigate(-1);
                    glib::Propagation::Stop
                }
                Key::Right => {
                    viewer.navigate(1);
                    glib::Propagation::Stop
                }
                Key::plus | Key::equal | Key::KP_Add => {
                    viewer.imp().machine.borrow_mut().wheel_zoom(true);
                    viewer.update_transform();
                    viewer.update_chrome();
                    glib::Propagation::Stop
                }
                Key::minus | Key::KP_Subtract => {
                    viewer.imp().machine.borrow_mut().wheel_zoom(false);
                    viewer.update_transform();
                    viewer.update_chrome();
                    glib::Propagation::Stop
                }
                _ => glib::Propagation::Proceed,
            }
        });

        overlay.add_controller(key_controller);
    }
}
