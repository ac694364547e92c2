#![cfg_attr(
    all(target_os = "windows", not(debug_assertions)),
    windows_subsystem = "windows"
)]

mod review_viewer;

use gpui::*;
use gpui_component::*;
use kreview::logger;
use kreview::review::ReviewStore;
use review_viewer::ReviewViewer;

gpui::actions!(
    kreview,
    [OpenPdfMenu, EnableLoggingMenu, DisableLoggingMenu, OpenLogsMenu]
);

pub(crate) fn configure_app_menus(cx: &mut App) {
    let mut items = vec![
        MenuItem::action("Open PDF...", OpenPdfMenu),
        MenuItem::separator(),
    ];

    if logger::file_logging_enabled() {
        items.extend([
            MenuItem::action("Open Logs", OpenLogsMenu),
            MenuItem::separator(),
            MenuItem::action("Disable Logging", DisableLoggingMenu),
        ]);
    } else {
        items.push(MenuItem::action("Enable Logging", EnableLoggingMenu));
    }

    cx.set_menus(vec![Menu {
        name: "kReview".into(),
        items,
    }]);
}

fn open_review_store() -> Option<ReviewStore> {
    let path = ReviewStore::default_path();
    match ReviewStore::open(&path) {
        Ok(store) => Some(store),
        Err(err) => {
            kreview::warn_log!(
                "[app] review database unavailable, annotations disabled: {} | {:#}",
                path.display(),
                err
            );
            None
        }
    }
}

fn main() {
    logger::initialize();

    let app = Application::new();

    app.run(move |cx| {
        configure_app_menus(cx);

        gpui_component::init(cx);
        Theme::change(cx.window_appearance(), None, cx);
        #[cfg(target_os = "macos")]
        cx.on_window_closed(|cx| {
            if cx.windows().is_empty() {
                cx.quit();
            }
        })
        .detach();

        let store = open_review_store();
        let saved_size = store.as_ref().and_then(ReviewStore::window_size);

        cx.spawn(async move |cx| {
            let saved_window_bounds = if let Some((w, h)) = saved_size {
                Some(cx.update(|app| WindowBounds::centered(size(px(w), px(h)), app))?)
            } else {
                None
            };

            let window_options = WindowOptions {
                titlebar: Some(TitlebarOptions {
                    title: Some("kReview".into()),
                    ..Default::default()
                }),
                window_bounds: saved_window_bounds,
                ..WindowOptions::default()
            };

            cx.open_window(window_options, |window, cx| {
                let view = cx.new(|cx| ReviewViewer::new(store, window, cx));
                cx.new(|cx| Root::new(view, window, cx))
            })?;
            Ok::<_, anyhow::Error>(())
        })
        .detach();

        cx.activate(true);
    });
}
