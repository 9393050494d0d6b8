// Main window for the obscura gallery client
// GTK4 ApplicationWindow with the portfolio grid, category filter bar,
// viewer overlay, client-album unlock flow and the consent banner.

use gdk4::Display;
use gtk4::prelude::*;
use gtk4::{
    Align, Application, ApplicationWindow, Box as GtkBox, Button, CheckButton, CssProvider, Entry,
    Label, Orientation, Overlay, ToggleButton, Window, STYLE_PROVIDER_PRIORITY_APPLICATION,
};
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::{info, warn};

use super::grid::GalleryGrid;
use super::viewer::GalleryViewer;
use crate::api::{self, Album, ApiClient, ApiError, Category, PinVerification, PortfolioPage};
use crate::config::Config;
use crate::images::{cache::max_memory_mb_from_env, FetchKind, ImageCache, ImagePipeline};
use crate::layout::JustifiedLayout;
use crate::models::{FetchTicket, GalleryImage, PageOutcome, PortfolioFeed, RowModel};
use crate::storage::{ConsentRecord, ConsentStore, KvStore, PinCache, SqliteStore};

const DIALOG_MARGIN: i32 = 12;
const RELAYOUT_DEBOUNCE_MS: u64 = 120;
/// Delay before checking whether the freshly laid-out content underfills
/// the viewport (allocation has to settle first).
const FILL_CHECK_DELAY_MS: u64 = 50;

struct DialogShell {
    dialog: Window,
    content: GtkBox,
    close_button: Button,
}

struct UnlockDialog {
    dialog: Window,
    album_entry: Entry,
    pin_entry: Entry,
    error_label: Label,
    unlock_button: Button,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ContentSource {
    Portfolio,
    Album { id: String, title: String },
}

/// Results crossing back from the I/O runtime to the main loop.
enum AppEvent {
    Categories(Result<Vec<Category>, ApiError>),
    Page {
        ticket: FetchTicket,
        result: Result<PortfolioPage, ApiError>,
    },
    PinChecked {
        /// The album the user asked for; `None` for a PIN-only lookup.
        requested_album: Option<String>,
        pin: String,
        from_cache: bool,
        result: Result<PinVerification, ApiError>,
    },
    AlbumLoaded {
        album_id: String,
        result: Result<Album, ApiError>,
    },
    DownloadFinished {
        result: Result<PathBuf, ApiError>,
    },
}

/// Classify a portfolio response for the feed. `base_index` is how many
/// items the feed already holds; it seeds the masonry size hints.
fn page_outcome(result: Result<PortfolioPage, ApiError>, base_index: usize) -> PageOutcome {
    match result {
        Ok(page) => {
            let has_next = page.next.is_some();
            let items = page
                .results
                .into_iter()
                .enumerate()
                .map(|(i, item)| item.into_gallery_image(base_index + i))
                .collect();
            PageOutcome::Page { items, has_next }
        }
        Err(ApiError::EndOfData) => PageOutcome::EndOfData,
        Err(err @ ApiError::Transient(_)) => PageOutcome::Transient(err.to_string()),
        Err(err) => PageOutcome::Failed(err.to_string()),
    }
}

fn download_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| {
            dirs.download_dir()
                .map(Path::to_path_buf)
                .or_else(|| Some(dirs.home_dir().to_path_buf()))
        })
        .unwrap_or_else(|| PathBuf::from("."))
}

/// CSS for the studio aesthetic - embedded as fallback
const FALLBACK_CSS: &str = r#"
window {
    background-color: #ffffff;
    color: #111111;
}

button {
    background-color: transparent;
    border: 1px solid rgba(0, 0, 0, 0.15);
    color: #111111;
    border-radius: 0;
}

button:hover {
    background-color: rgba(0, 0, 0, 0.05);
}

.category-filter button:checked {
    background-color: #111111;
    color: #ffffff;
}

.gallery-row {
    background-color: #ffffff;
}

.gallery-tile {
    background-color: #f4f2ef;
}

.status-bar {
    color: rgba(0, 0, 0, 0.6);
    font-size: 12px;
    padding: 8px;
}

.error-text {
    color: #b3261e;
}

.viewer-backdrop {
    background-color: rgba(10, 10, 10, 0.97);
}

.viewer-counter, .viewer-zoom, .viewer-loading {
    color: #ffffff;
}

.viewer-zoom {
    background-color: rgba(0, 0, 0, 0.5);
    padding: 4px 12px;
}

.viewer-button {
    background-color: rgba(0, 0, 0, 0.4);
    border: 1px solid rgba(255, 255, 255, 0.3);
    color: #ffffff;
}

.consent-banner {
    background-color: #111111;
    color: #ffffff;
    padding: 12px;
}

.consent-banner label, .consent-banner checkbutton {
    color: #ffffff;
}
"#;

/// Load and apply the CSS stylesheet
fn load_css() {
    let provider = CssProvider::new();

    // Try to load from file first, fall back to embedded CSS
    let css_path = concat!(env!("CARGO_MANIFEST_DIR"), "/src/style.css");

    if Path::new(css_path).exists() {
        provider.load_from_path(css_path);
        tracing::info!("Loaded CSS from: {}", css_path);
    } else {
        provider.load_from_string(FALLBACK_CSS);
        tracing::info!("Loaded fallback embedded CSS");
    }

    if let Some(display) = Display::default() {
        gtk4::style_context_add_provider_for_display(
            &display,
            &provider,
            STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
    }
}

/// Main window for the gallery client
pub struct MainWindow {
    self_weak: RefCell<Weak<MainWindow>>,
    window: ApplicationWindow,
    root_overlay: Overlay,
    grid: GalleryGrid,
    viewer: GalleryViewer,
    api: ApiClient,
    pipeline: Rc<ImagePipeline>,
    layout: JustifiedLayout,
    feed: RefCell<PortfolioFeed>,
    categories: RefCell<Vec<Category>>,
    category_buttons: RefCell<Vec<(Option<String>, ToggleButton)>>,
    active_source: RefCell<ContentSource>,
    album_images: RefCell<Vec<GalleryImage>>,
    album_pin: RefCell<Option<(String, String)>>,
    unlock_dialog: RefCell<Option<UnlockDialog>>,
    pins: PinCache,
    consent: ConsentStore,
    consent_banner: RefCell<Option<GtkBox>>,
    events_tx: async_channel::Sender<AppEvent>,
    heading_label: Label,
    status_label: Label,
    category_box: GtkBox,
    album_button: Button,
    back_button: Button,
    download_button: Button,
    last_layout_width: Cell<i32>,
    relayout_pending: Cell<bool>,
    downloading: Cell<bool>,
}

impl MainWindow {
    fn sanitize_positive_width(value: f32) -> Option<f32> {
        if value.is_finite() && value > 0.0 {
            Some(value.max(1.0))
        } else {
            None
        }
    }

    /// Scale down any row whose tiles (plus gaps) exceed the viewport so a
    /// single oversized tile can never force horizontal overflow.
    fn clamp_rows_to_width(mut rows: Vec<RowModel>, max_width: f32, gap: f32) -> Vec<RowModel> {
        let Some(max_width) = Self::sanitize_positive_width(max_width) else {
            return rows;
        };

        for row in &mut rows {
            if row.items.is_empty() {
                row.height_px = Self::sanitize_positive_width(row.height_px).unwrap_or(1.0);
                continue;
            }

            let mut total_width = gap * (row.items.len().saturating_sub(1)) as f32;
            let mut row_height = 1.0f32;

            for item in &mut row.items {
                item.display_w = Self::sanitize_positive_width(item.display_w).unwrap_or(1.0);
                item.display_h = Self::sanitize_positive_width(item.display_h).unwrap_or(1.0);
                total_width += item.display_w;
                row_height = row_height.max(item.display_h);
            }

            if total_width > max_width {
                let scale = (max_width / total_width).clamp(0.0, 1.0);
                row_height = 1.0;
                for item in &mut row.items {
                    item.display_w = (item.display_w * scale).max(1.0);
                    item.display_h = (item.display_h * scale).max(1.0);
                    row_height = row_height.max(item.display_h);
                }
            }

            row.height_px = row_height.max(1.0);
        }

        rows
    }

    fn build_dialog_shell(&self, title: &str, width: i32) -> DialogShell {
        let dialog = Window::builder()
            .title(title)
            .transient_for(&self.window)
            .modal(true)
            .resizable(false)
            .default_width(width)
            .build();

        let content = GtkBox::new(Orientation::Vertical, 12);
        content.set_margin_top(DIALOG_MARGIN);
        content.set_margin_bottom(DIALOG_MARGIN);
        content.set_margin_start(DIALOG_MARGIN);
        content.set_margin_end(DIALOG_MARGIN);

        let header = GtkBox::new(Orientation::Horizontal, 8);
        let close_button = Button::with_label("Close");
        header.append(&close_button);
        let header_spacer = GtkBox::new(Orientation::Horizontal, 0);
        header_spacer.set_hexpand(true);
        header.append(&header_spacer);
        content.append(&header);

        dialog.set_child(Some(&content));

        DialogShell {
            dialog,
            content,
            close_button,
        }
    }

    pub fn new(app: &Application) -> Rc<Self> {
        load_css();

        let config = Config::from_env();
        let api = ApiClient::new(&config).expect("Failed to build API client");

        let cache = ImageCache::new_default(max_memory_mb_from_env())
            .expect("Failed to initialize image cache");
        let pipeline = Rc::new(ImagePipeline::new(api.clone(), cache));

        let store: Rc<dyn KvStore> = match SqliteStore::open_default() {
            Ok(store) => Rc::new(store),
            Err(err) => {
                // A broken store only costs cached PINs and the consent
                // banner reappearing; fall back to an in-memory session.
                warn!(error = ?err, "Local store unavailable, using in-memory fallback");
                Rc::new(crate::storage::MemoryStore::new())
            }
        };
        let pins = PinCache::new(store.clone());
        let consent = ConsentStore::new(store);

        let window = ApplicationWindow::builder()
            .application(app)
            .title("obscura - studio gallery")
            .default_width(1200)
            .default_height(800)
            .build();

        // Header: title row plus the category filter bar
        let header = GtkBox::new(Orientation::Vertical, 8);
        header.set_margin_top(12);
        header.set_margin_bottom(8);
        header.set_margin_start(16);
        header.set_margin_end(16);

        let title_row = GtkBox::new(Orientation::Horizontal, 8);
        let heading_label = Label::new(Some("Portfolio"));
        heading_label.set_halign(Align::Start);
        heading_label.add_css_class("heading");
        title_row.append(&heading_label);

        let title_spacer = GtkBox::new(Orientation::Horizontal, 0);
        title_spacer.set_hexpand(true);
        title_row.append(&title_spacer);

        let back_button = Button::with_label("Back to portfolio");
        back_button.set_visible(false);
        title_row.append(&back_button);

        let download_button = Button::with_label("Download album");
        download_button.set_visible(false);
        title_row.append(&download_button);

        let album_button = Button::with_label("Client album...");
        title_row.append(&album_button);

        header.append(&title_row);

        let category_box = GtkBox::new(Orientation::Horizontal, 8);
        category_box.add_css_class("category-filter");
        header.append(&category_box);

        let grid = GalleryGrid::new(pipeline.clone());
        let viewer = GalleryViewer::new(pipeline.clone());

        let status_label = Label::new(None);
        status_label.set_halign(Align::Center);
        status_label.add_css_class("status-bar");

        let content = GtkBox::new(Orientation::Vertical, 0);
        content.append(&header);
        content.append(grid.widget());
        content.append(&status_label);

        let root_overlay = Overlay::new();
        root_overlay.set_child(Some(&content));
        root_overlay.add_overlay(&viewer.widget());

        window.set_child(Some(&root_overlay));

        let (events_tx, events_rx) = async_channel::unbounded::<AppEvent>();

        let main_window = Rc::new(Self {
            self_weak: RefCell::new(Weak::new()),
            window,
            root_overlay,
            grid,
            viewer,
            api,
            pipeline,
            layout: JustifiedLayout::default(),
            feed: RefCell::new(PortfolioFeed::new()),
            categories: RefCell::new(Vec::new()),
            category_buttons: RefCell::new(Vec::new()),
            active_source: RefCell::new(ContentSource::Portfolio),
            album_images: RefCell::new(Vec::new()),
            album_pin: RefCell::new(None),
            unlock_dialog: RefCell::new(None),
            pins,
            consent,
            consent_banner: RefCell::new(None),
            events_tx,
            heading_label,
            status_label,
            category_box,
            album_button,
            back_button,
            download_button,
            last_layout_width: Cell::new(0),
            relayout_pending: Cell::new(false),
            downloading: Cell::new(false),
        });
        *main_window.self_weak.borrow_mut() = Rc::downgrade(&main_window);

        main_window.wire_callbacks();
        main_window.drain_events(events_rx);
        main_window.drain_fetch_results();
        main_window.show_consent_banner_if_needed();

        // Initial content: the category list plus the first portfolio page.
        main_window.fetch_categories();
        main_window.refresh_portfolio(None);

        main_window
    }

    fn weak(&self) -> Weak<MainWindow> {
        self.self_weak.borrow().clone()
    }

    fn wire_callbacks(self: &Rc<Self>) {
        let weak = self.weak();
        self.grid.connect_item_activated(move |image_index| {
            if let Some(win) = weak.upgrade() {
                win.open_viewer(image_index);
            }
        });

        let weak = self.weak();
        self.grid.connect_near_bottom(move || {
            if let Some(win) = weak.upgrade() {
                win.maybe_load_more();
            }
        });

        let weak = self.weak();
        self.grid.connect_width_changed(move |_width| {
            if let Some(win) = weak.upgrade() {
                win.schedule_relayout();
            }
        });

        let weak = self.weak();
        self.viewer.connect_closed(move || {
            if let Some(win) = weak.upgrade() {
                win.window.grab_focus();
            }
        });

        let weak = self.weak();
        self.album_button.connect_clicked(move |_| {
            if let Some(win) = weak.upgrade() {
                win.open_unlock_dialog();
            }
        });

        let weak = self.weak();
        self.back_button.connect_clicked(move |_| {
            if let Some(win) = weak.upgrade() {
                win.set_source(ContentSource::Portfolio);
            }
        });

        let weak = self.weak();
        self.download_button.connect_clicked(move |_| {
            if let Some(win) = weak.upgrade() {
                win.start_download();
            }
        });
    }

    /// Drain application events coming back from the I/O runtime.
    fn drain_events(self: &Rc<Self>, events_rx: async_channel::Receiver<AppEvent>) {
        let weak = self.weak();
        glib::spawn_future_local(async move {
            while let Ok(event) = events_rx.recv().await {
                let Some(win) = weak.upgrade() else { break };
                win.handle_event(event);
            }
        });
    }

    /// Drain completed image fetches and route them to grid or viewer.
    fn drain_fetch_results(self: &Rc<Self>) {
        let weak = self.weak();
        let results = self.pipeline.results();
        glib::spawn_future_local(async move {
            while let Ok(result) = results.recv().await {
                let Some(win) = weak.upgrade() else { break };
                if let Some(error) = &result.error {
                    warn!(url = %result.url, error = %error, "Image fetch failed");
                }
                match result.kind {
                    FetchKind::Tile => win
                        .grid
                        .tile_loader()
                        .on_texture_ready(&result.url, result.texture.as_ref()),
                    FetchKind::Full => win.viewer.notify_image(
                        &result.url,
                        result.texture.as_ref(),
                        result.width,
                        result.height,
                    ),
                }
            }
        });
    }

    fn handle_event(self: &Rc<Self>, event: AppEvent) {
        match event {
            AppEvent::Categories(result) => self.handle_categories(result),
            AppEvent::Page { ticket, result } => self.handle_page(ticket, result),
            AppEvent::PinChecked {
                requested_album,
                pin,
                from_cache,
                result,
            } => self.handle_pin_checked(requested_album, pin, from_cache, result),
            AppEvent::AlbumLoaded { album_id, result } => self.handle_album_loaded(album_id, result),
            AppEvent::DownloadFinished { result } => self.handle_download_finished(result),
        }
    }

    // ---- Portfolio pagination -------------------------------------------

    fn fetch_categories(&self) {
        let api = self.api.clone();
        let tx = self.events_tx.clone();
        api::runtime().spawn(async move {
            let result = api.fetch_categories().await;
            let _ = tx.send(AppEvent::Categories(result)).await;
        });
    }

    fn handle_categories(self: &Rc<Self>, result: Result<Vec<Category>, ApiError>) {
        match result {
            Ok(categories) => {
                info!(count = categories.len(), "Loaded categories");
                *self.categories.borrow_mut() = categories;
                self.rebuild_category_bar();
            }
            Err(err) => {
                // The unfiltered portfolio still works without the filter bar.
                warn!(error = %err, "Failed to load categories");
            }
        }
    }

    fn rebuild_category_bar(self: &Rc<Self>) {
        while let Some(child) = self.category_box.first_child() {
            self.category_box.remove(&child);
        }
        let mut buttons = Vec::new();

        let active = self.feed.borrow().category().map(str::to_string);
        let mut entries: Vec<(Option<String>, String)> = vec![(None, "All".to_string())];
        entries.extend(
            self.categories
                .borrow()
                .iter()
                .map(|c| (Some(c.slug.clone()), c.name.clone())),
        );

        for (slug, name) in entries {
            let button = ToggleButton::with_label(&name);
            button.set_active(slug.as_deref() == active.as_deref());
            let weak = self.weak();
            let slug_for_click = slug.clone();
            button.connect_clicked(move |_| {
                if let Some(win) = weak.upgrade() {
                    win.select_category(slug_for_click.clone());
                }
            });
            self.category_box.append(&button);
            buttons.push((slug, button));
        }
        *self.category_buttons.borrow_mut() = buttons;
    }

    fn sync_category_buttons(&self) {
        let active = self.feed.borrow().category().map(str::to_string);
        for (slug, button) in self.category_buttons.borrow().iter() {
            button.set_active(slug.as_deref() == active.as_deref());
        }
    }

    fn select_category(self: &Rc<Self>, slug: Option<String>) {
        {
            let feed = self.feed.borrow();
            if feed.category().map(str::to_string) == slug
                && *self.active_source.borrow() == ContentSource::Portfolio
            {
                self.sync_category_buttons();
                return;
            }
        }
        if *self.active_source.borrow() != ContentSource::Portfolio {
            self.set_source(ContentSource::Portfolio);
        }
        self.refresh_portfolio(slug);
    }

    /// Start a fresh feed session for `category`. Any in-flight page fetch
    /// is invalidated by the generation bump inside the feed.
    fn refresh_portfolio(self: &Rc<Self>, category: Option<String>) {
        let ticket = self.feed.borrow_mut().begin_refresh(category);
        self.sync_category_buttons();
        self.grid.scroll_to_top();
        self.rebuild_grid();
        self.update_status();
        self.spawn_page_fetch(ticket);
    }

    fn maybe_load_more(self: &Rc<Self>) {
        if *self.active_source.borrow() != ContentSource::Portfolio {
            return;
        }
        let ticket = self.feed.borrow_mut().try_begin_fetch();
        if let Some(ticket) = ticket {
            self.update_status();
            self.spawn_page_fetch(ticket);
        }
    }

    fn spawn_page_fetch(&self, ticket: FetchTicket) {
        let api = self.api.clone();
        let tx = self.events_tx.clone();
        api::runtime().spawn(async move {
            let result = api
                .fetch_portfolio(ticket.category.as_deref(), ticket.page)
                .await;
            let _ = tx.send(AppEvent::Page { ticket, result }).await;
        });
    }

    fn handle_page(self: &Rc<Self>, ticket: FetchTicket, result: Result<PortfolioPage, ApiError>) {
        let changed = {
            let mut feed = self.feed.borrow_mut();
            let outcome = page_outcome(result, feed.items().len());
            feed.apply(&ticket, outcome)
        };
        if !changed {
            // Stale generation: a category switch already superseded it.
            return;
        }
        if *self.active_source.borrow() == ContentSource::Portfolio {
            self.rebuild_grid();
            self.update_status();
        }
    }

    // ---- Grid -----------------------------------------------------------

    fn current_images(&self) -> Vec<GalleryImage> {
        match &*self.active_source.borrow() {
            ContentSource::Portfolio => self.feed.borrow().items().to_vec(),
            ContentSource::Album { .. } => self.album_images.borrow().clone(),
        }
    }

    fn rebuild_grid(self: &Rc<Self>) {
        let width = self.grid.content_width();
        let width = if width > 100.0 {
            width
        } else {
            self.window.default_width() as f32
        };
        self.last_layout_width.set(width as i32);

        let items = self.current_images();
        let rows = self.layout.compute(&items, width);
        let rows = Self::clamp_rows_to_width(rows, width, self.layout.gap);
        self.grid.set_rows(rows);

        // If the content underfills the viewport no scroll event can ever
        // fire the sentinel; check once allocation settles.
        let weak = self.weak();
        glib::timeout_add_local_once(Duration::from_millis(FILL_CHECK_DELAY_MS), move || {
            if let Some(win) = weak.upgrade() {
                let wants_more = {
                    let feed = win.feed.borrow();
                    feed.has_more() && !feed.is_loading()
                };
                if *win.active_source.borrow() == ContentSource::Portfolio
                    && wants_more
                    && win.grid.content_fits_viewport()
                {
                    win.maybe_load_more();
                }
            }
        });
    }

    fn schedule_relayout(self: &Rc<Self>) {
        if self.relayout_pending.get() {
            return;
        }
        self.relayout_pending.set(true);
        let weak = self.weak();
        glib::timeout_add_local_once(Duration::from_millis(RELAYOUT_DEBOUNCE_MS), move || {
            if let Some(win) = weak.upgrade() {
                win.relayout_pending.set(false);
                let width = win.grid.content_width() as i32;
                if width > 0 && width != win.last_layout_width.get() {
                    win.rebuild_grid();
                }
            }
        });
    }

    fn update_status(&self) {
        self.status_label.remove_css_class("error-text");
        let text = match &*self.active_source.borrow() {
            ContentSource::Portfolio => {
                let feed = self.feed.borrow();
                if feed.is_loading() {
                    "Loading...".to_string()
                } else if let Some(error) = feed.last_error() {
                    self.status_label.add_css_class("error-text");
                    if feed.has_more() {
                        format!("Could not load more: {error}. Scroll again to retry.")
                    } else {
                        format!("Could not load more: {error}")
                    }
                } else if feed.items().is_empty() {
                    "No photographs in this category yet.".to_string()
                } else if feed.has_more() {
                    format!("{} photographs", feed.items().len())
                } else {
                    format!("{} photographs - end of gallery", feed.items().len())
                }
            }
            ContentSource::Album { title, .. } => {
                format!("{} - {} photographs", title, self.album_images.borrow().len())
            }
        };
        self.status_label.set_text(&text);
    }

    fn open_viewer(&self, image_index: usize) {
        let images = self.current_images();
        self.viewer.open(images, image_index);
    }

    fn set_source(self: &Rc<Self>, source: ContentSource) {
        let is_album = matches!(source, ContentSource::Album { .. });
        match &source {
            ContentSource::Portfolio => self.heading_label.set_text("Portfolio"),
            ContentSource::Album { title, .. } => self.heading_label.set_text(title),
        }
        self.category_box.set_visible(!is_album);
        self.back_button.set_visible(is_album);
        self.download_button.set_visible(is_album);
        *self.active_source.borrow_mut() = source;
        self.grid.scroll_to_top();
        self.rebuild_grid();
        self.update_status();
    }

    // ---- Client album flow ----------------------------------------------

    fn open_unlock_dialog(self: &Rc<Self>) {
        if self.unlock_dialog.borrow().is_some() {
            return;
        }

        let shell = self.build_dialog_shell("Client album", 360);

        let intro = Label::new(Some(
            "Enter the 4-digit PIN you received from the studio. \
             The album number can be left empty; the PIN then selects it.",
        ));
        intro.set_wrap(true);
        intro.set_halign(Align::Start);
        shell.content.append(&intro);

        let album_entry = Entry::new();
        album_entry.set_placeholder_text(Some("Album number (optional)"));
        shell.content.append(&album_entry);

        let pin_entry = Entry::new();
        pin_entry.set_placeholder_text(Some("PIN (cached one is used if left empty)"));
        pin_entry.set_max_length(4);
        pin_entry.connect_changed(|entry| {
            let text = entry.text();
            let digits: String = text.chars().filter(char::is_ascii_digit).take(4).collect();
            if digits != text.as_str() {
                entry.set_text(&digits);
            }
        });
        shell.content.append(&pin_entry);

        let error_label = Label::new(None);
        error_label.add_css_class("error-text");
        error_label.set_wrap(true);
        error_label.set_visible(false);
        shell.content.append(&error_label);

        let unlock_button = Button::with_label("Unlock album");
        shell.content.append(&unlock_button);

        let weak = self.weak();
        unlock_button.connect_clicked(move |_| {
            if let Some(win) = weak.upgrade() {
                win.submit_unlock();
            }
        });
        let weak = self.weak();
        pin_entry.connect_activate(move |_| {
            if let Some(win) = weak.upgrade() {
                win.submit_unlock();
            }
        });

        let weak = self.weak();
        shell.close_button.connect_clicked(move |_| {
            if let Some(win) = weak.upgrade() {
                win.close_unlock_dialog();
            }
        });
        let weak = self.weak();
        shell.dialog.connect_close_request(move |_| {
            if let Some(win) = weak.upgrade() {
                win.unlock_dialog.borrow_mut().take();
            }
            glib::Propagation::Proceed
        });

        shell.dialog.present();

        *self.unlock_dialog.borrow_mut() = Some(UnlockDialog {
            dialog: shell.dialog,
            album_entry,
            pin_entry,
            error_label,
            unlock_button,
        });
    }

    fn close_unlock_dialog(&self) {
        // Take before closing: close() re-enters via the close-request
        // handler, which also touches this cell.
        let dialog = self.unlock_dialog.borrow_mut().take();
        if let Some(dialog) = dialog {
            dialog.dialog.close();
        }
    }

    fn unlock_error(&self, message: &str) {
        if let Some(dialog) = self.unlock_dialog.borrow().as_ref() {
            dialog.error_label.set_text(message);
            dialog.error_label.set_visible(true);
            dialog.unlock_button.set_sensitive(true);
        }
    }

    fn submit_unlock(self: &Rc<Self>) {
        let (album_id, pin) = {
            let dialog = self.unlock_dialog.borrow();
            let Some(dialog) = dialog.as_ref() else { return };
            dialog.error_label.set_visible(false);
            (
                dialog.album_entry.text().trim().to_string(),
                dialog.pin_entry.text().to_string(),
            )
        };
        let requested_album = (!album_id.is_empty()).then_some(album_id);

        let (pin, from_cache) = if pin.is_empty() {
            // No PIN typed: fall back to the cached one for this album.
            match requested_album.as_deref().and_then(|id| self.pins.get(id)) {
                Some(cached) => (cached, true),
                None => {
                    self.unlock_error("Enter the 4-digit PIN.");
                    return;
                }
            }
        } else if pin.len() < 4 {
            self.unlock_error("The PIN has 4 digits.");
            return;
        } else {
            (pin, false)
        };

        if let Some(dialog) = self.unlock_dialog.borrow().as_ref() {
            dialog.unlock_button.set_sensitive(false);
        }

        let api = self.api.clone();
        let tx = self.events_tx.clone();
        api::runtime().spawn(async move {
            let result = api.verify_pin(&pin, requested_album.as_deref()).await;
            let _ = tx
                .send(AppEvent::PinChecked {
                    requested_album,
                    pin,
                    from_cache,
                    result,
                })
                .await;
        });
    }

    fn handle_pin_checked(
        self: &Rc<Self>,
        requested_album: Option<String>,
        pin: String,
        from_cache: bool,
        result: Result<PinVerification, ApiError>,
    ) {
        match result {
            Ok(verification) if verification.valid => {
                // The response must name the album, and it must be the one
                // the user asked for when they named one themselves.
                let Some(album_id) = verification.album_id else {
                    self.unlock_error("The server did not name an album for this PIN.");
                    return;
                };
                if let Some(requested) = &requested_album {
                    if *requested != album_id {
                        if from_cache {
                            self.pins.forget(requested);
                        }
                        self.unlock_error("Invalid PIN for this album.");
                        return;
                    }
                }

                info!(%album_id, "PIN accepted");
                self.pins.remember(&album_id, &pin);
                *self.album_pin.borrow_mut() = Some((album_id.clone(), pin));
                self.close_unlock_dialog();
                self.status_label.set_text("Loading album...");

                let api = self.api.clone();
                let tx = self.events_tx.clone();
                api::runtime().spawn(async move {
                    let result = api.fetch_album(&album_id).await;
                    let _ = tx.send(AppEvent::AlbumLoaded { album_id, result }).await;
                });
            }
            Ok(_) => {
                if let (true, Some(requested)) = (from_cache, &requested_album) {
                    self.pins.forget(requested);
                    self.unlock_error("The stored PIN is no longer valid. Enter it again.");
                } else {
                    self.unlock_error("Invalid PIN for this album.");
                }
            }
            Err(ApiError::Rejected(message)) => {
                if let (true, Some(requested)) = (from_cache, &requested_album) {
                    self.pins.forget(requested);
                }
                self.unlock_error(&message);
            }
            Err(ApiError::Transient(message)) => {
                self.unlock_error(&format!("Connection problem: {message}"));
            }
            Err(err) => {
                self.unlock_error(&err.to_string());
            }
        }
    }

    fn handle_album_loaded(self: &Rc<Self>, album_id: String, result: Result<Album, ApiError>) {
        match result {
            Ok(album) => {
                let images: Vec<GalleryImage> = album
                    .images
                    .into_iter()
                    .map(|img| img.into_gallery_image(&album.title))
                    .collect();
                info!(%album_id, count = images.len(), "Album loaded");
                *self.album_images.borrow_mut() = images;
                self.set_source(ContentSource::Album {
                    id: album.id,
                    title: album.title,
                });
            }
            Err(err) => {
                warn!(%album_id, error = %err, "Failed to load album");
                self.status_label.add_css_class("error-text");
                self.status_label
                    .set_text(&format!("Could not load the album: {err}"));
            }
        }
    }

    fn start_download(self: &Rc<Self>) {
        if self.downloading.get() {
            return;
        }
        let Some((album_id, pin)) = self.album_pin.borrow().clone() else {
            return;
        };

        self.downloading.set(true);
        self.download_button.set_sensitive(false);
        self.status_label.set_text("Downloading album archive...");

        let api = self.api.clone();
        let tx = self.events_tx.clone();
        let dest = download_dir();
        api::runtime().spawn(async move {
            let result = api.download_album(&album_id, &pin, &dest).await;
            let _ = tx.send(AppEvent::DownloadFinished { result }).await;
        });
    }

    fn handle_download_finished(self: &Rc<Self>, result: Result<PathBuf, ApiError>) {
        self.downloading.set(false);
        self.download_button.set_sensitive(true);
        self.status_label.remove_css_class("error-text");
        match result {
            Ok(path) => {
                self.status_label
                    .set_text(&format!("Archive saved to {}", path.display()));
            }
            Err(err) => {
                self.status_label.add_css_class("error-text");
                self.status_label
                    .set_text(&format!("Download failed: {err}"));
            }
        }
    }

    // ---- Consent banner -------------------------------------------------

    fn show_consent_banner_if_needed(self: &Rc<Self>) {
        if self.consent.load().is_some() {
            return;
        }

        let banner = GtkBox::new(Orientation::Vertical, 8);
        banner.add_css_class("consent-banner");
        banner.set_valign(Align::End);
        banner.set_hexpand(true);

        let text = Label::new(Some(
            "This app keeps a small local store (cached album PINs, image cache). \
             Choose whether anonymous usage statistics may be collected.",
        ));
        text.set_wrap(true);
        text.set_halign(Align::Start);
        banner.append(&text);

        let choices = GtkBox::new(Orientation::Horizontal, 12);
        let analytics_check = CheckButton::with_label("Usage statistics");
        let marketing_check = CheckButton::with_label("Marketing messages");
        choices.append(&analytics_check);
        choices.append(&marketing_check);

        let spacer = GtkBox::new(Orientation::Horizontal, 0);
        spacer.set_hexpand(true);
        choices.append(&spacer);

        let save_button = Button::with_label("Save selection");
        let necessary_button = Button::with_label("Necessary only");
        let accept_button = Button::with_label("Accept all");
        choices.append(&save_button);
        choices.append(&necessary_button);
        choices.append(&accept_button);
        banner.append(&choices);

        let weak = self.weak();
        let analytics_for_save = analytics_check.clone();
        let marketing_for_save = marketing_check.clone();
        save_button.connect_clicked(move |_| {
            if let Some(win) = weak.upgrade() {
                win.record_consent(ConsentRecord::custom(
                    analytics_for_save.is_active(),
                    marketing_for_save.is_active(),
                ));
            }
        });
        let weak = self.weak();
        necessary_button.connect_clicked(move |_| {
            if let Some(win) = weak.upgrade() {
                win.record_consent(ConsentRecord::necessary_only());
            }
        });
        let weak = self.weak();
        accept_button.connect_clicked(move |_| {
            if let Some(win) = weak.upgrade() {
                win.record_consent(ConsentRecord::accept_all());
            }
        });

        self.root_overlay.add_overlay(&banner);
        *self.consent_banner.borrow_mut() = Some(banner);
    }

    fn record_consent(&self, record: ConsentRecord) {
        info!(
            analytics = record.analytics,
            marketing = record.marketing,
            "Consent recorded"
        );
        self.consent.save(&record);
        let banner = self.consent_banner.borrow_mut().take();
        if let Some(banner) = banner {
            self.root_overlay.remove_overlay(&banner);
        }
    }

    pub fn present(&self) {
        self.window.present();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RowItem;

    fn img(id: &str) -> GalleryImage {
        GalleryImage::new(id.into(), format!("http://img/{id}.jpg"))
    }

    #[test]
    fn test_fallback_css_parses() {
        assert!(!FALLBACK_CSS.is_empty());
        assert!(FALLBACK_CSS.contains(".viewer-backdrop"));
    }

    #[test]
    fn page_outcome_success_converts_and_keeps_next() {
        let page = PortfolioPage {
            results: vec![],
            next: Some("http://x/api/portfolio/?page=3".into()),
        };
        match page_outcome(Ok(page), 0) {
            PageOutcome::Page { items, has_next } => {
                assert!(items.is_empty());
                assert!(has_next);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn page_outcome_offsets_masonry_hints() {
        let item = |id: i64| crate::api::PortfolioItem {
            id,
            title: String::new(),
            image: format!("http://img/{id}.jpg"),
            description: None,
            category: None,
        };
        let first = match page_outcome(
            Ok(PortfolioPage {
                results: vec![item(1)],
                next: None,
            }),
            0,
        ) {
            PageOutcome::Page { items, .. } => items,
            _ => unreachable!(),
        };
        let shifted = match page_outcome(
            Ok(PortfolioPage {
                results: vec![item(1)],
                next: None,
            }),
            3,
        ) {
            PageOutcome::Page { items, .. } => items,
            _ => unreachable!(),
        };
        // The hint follows the absolute position in the feed, so appended
        // pages continue the stagger instead of restarting it.
        assert_ne!(first[0].height, shifted[0].height);
    }

    #[test]
    fn page_outcome_classifies_errors() {
        assert!(matches!(
            page_outcome(Err(ApiError::EndOfData), 0),
            PageOutcome::EndOfData
        ));
        assert!(matches!(
            page_outcome(Err(ApiError::Transient("x".into())), 0),
            PageOutcome::Transient(_)
        ));
        assert!(matches!(
            page_outcome(Err(ApiError::Rejected("x".into())), 0),
            PageOutcome::Failed(_)
        ));
        assert!(matches!(
            page_outcome(Err(ApiError::Unexpected("x".into())), 0),
            PageOutcome::Failed(_)
        ));
    }

    #[test]
    fn clamp_rows_to_width_scales_oversized_rows() {
        let a = img("a");
        let b = img("b");
        let rows = vec![RowModel {
            row_index: 0,
            height_px: 220.0,
            items: vec![
                RowItem {
                    image_index: 0,
                    url: a.url.clone(),
                    display_w: 900.0,
                    display_h: 220.0,
                    tooltip: None,
                },
                RowItem {
                    image_index: 1,
                    url: b.url.clone(),
                    display_w: 700.0,
                    display_h: 220.0,
                    tooltip: None,
                },
            ],
        }];

        let clamped = MainWindow::clamp_rows_to_width(rows, 1200.0, 12.0);
        let total_width: f32 = clamped[0].items.iter().map(|item| item.display_w).sum();
        assert!(total_width + 12.0 <= 1200.0 + 0.01);
    }

    #[test]
    fn clamp_rows_to_width_sanitizes_invalid_item_dimensions() {
        let rows = vec![RowModel {
            row_index: 0,
            height_px: 220.0,
            items: vec![
                RowItem {
                    image_index: 0,
                    url: "http://img/a.jpg".into(),
                    display_w: f32::NAN,
                    display_h: f32::INFINITY,
                    tooltip: None,
                },
                RowItem {
                    image_index: 1,
                    url: "http://img/b.jpg".into(),
                    display_w: -1.0,
                    display_h: 100.0,
                    tooltip: None,
                },
            ],
        }];

        let clamped = MainWindow::clamp_rows_to_width(rows, 1200.0, 12.0);
        assert!(clamped[0].height_px.is_finite());
        for item in &clamped[0].items {
            assert!(item.display_w.is_finite() && item.display_w >= 1.0);
            assert!(item.display_h.is_finite() && item.display_h >= 1.0);
        }
    }
}
