// Grid view for gallery rows
// Uses GTK4 ListView with virtualization for smooth scrolling; exposes a
// near-bottom signal that drives infinite pagination.

use glib::Object;
use gtk4::prelude::*;
use gtk4::subclass::prelude::*;
use gtk4::{
    gio, glib, ListItem, ListView, NoSelection, PolicyType, ScrolledWindow, SignalListItemFactory,
};
use std::cell::RefCell;
use std::rc::Rc;

use super::row_widget::{GalleryRow, TileLoader};
use crate::images::ImagePipeline;
use crate::models::RowModel;

/// How close to the bottom (in pixels) the scroll position must get
/// before the next page is requested. Generous enough that fast flicks
/// rarely hit the very end before the fetch lands.
const LOAD_AHEAD_PX: f64 = 600.0;

// GObject wrapper for RowModel to use in ListStore
mod row_object {
    use super::*;

    mod imp {
        use super::*;

        #[derive(Default)]
        pub struct RowObjectInner {
            pub row_model: RefCell<Option<RowModel>>,
        }

        #[glib::object_subclass]
        impl ObjectSubclass for RowObjectInner {
            const NAME: &'static str = "ObscuraRowObject";
            type Type = super::RowObject;
            type ParentType = glib::Object;
        }

        impl ObjectImpl for RowObjectInner {}
    }

    glib::wrapper! {
        pub struct RowObject(ObjectSubclass<imp::RowObjectInner>);
    }

    impl RowObject {
        pub fn new(row_model: RowModel) -> Self {
            let obj: Self = Object::builder().build();
            obj.imp().row_model.replace(Some(row_model));
            obj
        }

        pub fn row_model(&self) -> Option<RowModel> {
            self.imp().row_model.borrow().clone()
        }
    }

    impl Default for RowObject {
        fn default() -> Self {
            Object::builder().build()
        }
    }
}

pub use row_object::RowObject;

/// GalleryGrid wraps a GTK ListView of [`GalleryRow`] widgets.
pub struct GalleryGrid {
    scrolled_window: ScrolledWindow,
    list_view: ListView,
    model: gio::ListStore,
    tile_loader: Rc<TileLoader>,
    on_item_activated: Rc<RefCell<Option<Box<dyn Fn(usize)>>>>,
}

impl GalleryGrid {
    pub fn new(pipeline: Rc<ImagePipeline>) -> Self {
        let model = gio::ListStore::new::<RowObject>();
        let selection_model = NoSelection::new(Some(model.clone()));
        let factory = SignalListItemFactory::new();
        let tile_loader = TileLoader::new(pipeline);

        let on_item_activated: Rc<RefCell<Option<Box<dyn Fn(usize)>>>> =
            Rc::new(RefCell::new(None));

        // Setup: create the row widget when a list item is created
        let on_item_activated_setup = on_item_activated.clone();
        factory.connect_setup(move |_factory, list_item| {
            let list_item = list_item
                .downcast_ref::<ListItem>()
                .expect("ListItem expected");
            let row_widget = GalleryRow::new();
            let on_item_activated = on_item_activated_setup.clone();
            row_widget.connect_item_activated(move |image_index| {
                if let Some(ref callback) = *on_item_activated.borrow() {
                    callback(image_index);
                }
            });
            list_item.set_child(Some(&row_widget));
        });

        // Bind: update the widget when data is bound to it
        let loader_for_bind = tile_loader.clone();
        factory.connect_bind(move |_factory, list_item| {
            let list_item = list_item
                .downcast_ref::<ListItem>()
                .expect("ListItem expected");

            let row_object = list_item
                .item()
                .and_downcast::<RowObject>()
                .expect("RowObject expected");

            let row_widget = list_item
                .child()
                .and_downcast::<GalleryRow>()
                .expect("GalleryRow expected");

            if let Some(row_model) = row_object.row_model() {
                row_widget.bind(&row_model, &loader_for_bind);
            }
        });

        factory.connect_unbind(|_factory, list_item| {
            let list_item = list_item
                .downcast_ref::<ListItem>()
                .expect("ListItem expected");

            if let Some(row_widget) = list_item.child().and_downcast::<GalleryRow>() {
                row_widget.unbind();
            }
        });

        factory.connect_teardown(|_factory, list_item| {
            let list_item = list_item
                .downcast_ref::<ListItem>()
                .expect("ListItem expected");
            list_item.set_child(Option::<&gtk4::Widget>::None);
        });

        let list_view = ListView::new(Some(selection_model), Some(factory));
        list_view.set_single_click_activate(false);
        list_view.set_enable_rubberband(false);
        list_view.add_css_class("gallery-grid");
        list_view.set_halign(gtk4::Align::Fill);
        list_view.set_hexpand(true);
        list_view.set_vexpand(true);

        let scrolled_window = ScrolledWindow::builder()
            .hscrollbar_policy(PolicyType::Never)
            .vscrollbar_policy(PolicyType::Automatic)
            .kinetic_scrolling(true)
            .propagate_natural_width(false)
            .propagate_natural_height(false)
            .child(&list_view)
            .build();
        scrolled_window.set_min_content_width(0);
        scrolled_window.set_min_content_height(0);

        Self {
            scrolled_window,
            list_view,
            model,
            tile_loader,
            on_item_activated,
        }
    }

    /// Get the scrolled window widget to add to the window
    pub fn widget(&self) -> &ScrolledWindow {
        &self.scrolled_window
    }

    pub fn tile_loader(&self) -> &TileLoader {
        &self.tile_loader
    }

    /// Get the content width available to the grid (excludes scrollbars).
    pub fn content_width(&self) -> f32 {
        let list_alloc = self.list_view.allocation().width() as f32;
        let scrolled_alloc = self.scrolled_window.allocation().width() as f32;
        let mut width = if scrolled_alloc > 0.0 {
            scrolled_alloc
        } else {
            list_alloc
        };
        if width <= 0.0 {
            return 0.0;
        }

        let vscrollbar = self.scrolled_window.vscrollbar();
        if vscrollbar.is_visible() {
            width = (width - vscrollbar.allocated_width() as f32).max(0.0);
        }

        width
    }

    /// Replace all rows
    pub fn set_rows(&self, rows: Vec<RowModel>) {
        let objects: Vec<RowObject> = rows.into_iter().map(RowObject::new).collect();
        self.model.splice(0, self.model.n_items(), &objects);
    }

    pub fn scroll_to_top(&self) {
        let vadj = self.scrolled_window.vadjustment();
        vadj.set_value(vadj.lower());
    }

    /// True when the laid-out content does not overflow the viewport, so
    /// scrolling alone can never reach the sentinel.
    pub fn content_fits_viewport(&self) -> bool {
        let vadj = self.scrolled_window.vadjustment();
        vadj.upper() <= vadj.page_size() + 1.0
    }

    /// Notify whenever the scroll position nears the end of the content.
    /// This is the pagination sentinel: it can fire in bursts, the
    /// caller's loading guard is the only dedup.
    pub fn connect_near_bottom<F>(&self, callback: F)
    where
        F: Fn() + 'static,
    {
        let vadj = self.scrolled_window.vadjustment();
        vadj.connect_value_changed(move |adj| {
            let remaining = adj.upper() - (adj.value() + adj.page_size());
            if adj.upper() > adj.page_size() && remaining < LOAD_AHEAD_PX {
                callback();
            }
        });
    }

    /// Notify when the usable grid width may have changed (window resize,
    /// scrollbar appearing). Reports the new content width.
    pub fn connect_width_changed<F>(&self, callback: F)
    where
        F: Fn(f32) + 'static,
    {
        let hadj = self.scrolled_window.hadjustment();
        let scrolled = self.scrolled_window.clone();
        let list_view = self.list_view.clone();
        hadj.connect_changed(move |_| {
            let mut width = scrolled.allocation().width() as f32;
            if width <= 0.0 {
                width = list_view.allocation().width() as f32;
            }
            if width > 0.0 {
                let vscrollbar = scrolled.vscrollbar();
                if vscrollbar.is_visible() {
                    width = (width - vscrollbar.allocated_width() as f32).max(0.0);
                }
                callback(width);
            }
        });
    }

    pub fn connect_item_activated<F>(&self, callback: F)
    where
        F: Fn(usize) + 'static,
    {
        *self.on_item_activated.borrow_mut() = Some(Box::new(callback));
    }
}
