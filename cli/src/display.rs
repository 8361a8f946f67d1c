use {
    crate::prelude::*,
    colored::ColoredString,
    std::{
        sync::{atomic::AtomicBool, Arc},
        thread,
    },
};

/// Print a grey colored line to separate sections
pub(crate) fn separator() -> ColoredString {
    "\n-=-=-=-=-=-=-=-".truecolor(100, 100, 100)
}

/// Print the title of the currently executed command.
#[macro_export]
macro_rules! command_title {
    ($($args:tt)*) => {
        if !JSON_MODE.load(Ordering::Relaxed) {
            println!(
                "\n{arrow} {title}{separator}",
                arrow = "▶".bold().purple(),
                title = format!($($args)*).bold(),
                separator = $crate::display::separator()
            );
        }
    };
}

/// Notify the user of a successful operation. Basically [`println!`] but
/// includes a not [`JSON_MODE`] check and some success formatting.
#[macro_export]
macro_rules! notify_success {
    ($($args:tt)*) => {
        if !JSON_MODE.load(Ordering::Relaxed) {
            println!(
                "[{check}] {msg}",
                check = "✔".green().bold(),
                msg = format!($($args)*)
            );
        }
    };
}

/// Similar to [`notify_success!`] but for errors.
#[macro_export]
macro_rules! notify_error {
    ($($args:tt)*) => {
        if !JSON_MODE.load(Ordering::Relaxed) {
            eprintln!(
                "[{ballot}] {msg}",
                ballot = "✘".red().bold(),
                msg = format!($($args)*)
            );
        }
    };
}

/// Formatted list item.
#[macro_export]
macro_rules! item {
    ($($args:tt)*) => {
        if !JSON_MODE.load(Ordering::Relaxed) {
            println!(
                "    {arrow} {item}",
                arrow = "▶".truecolor(100, 100, 100),
                item = format!($($args)*)
            );
        }
    };
}

/// Macro to print a loading state. Accepts a message and returns `success` and
/// `error` handles to change the state of the loading.
#[macro_export]
macro_rules! loading {
    ($fmt:expr) => {{
        use std::{
            io::Write,
            sync::{atomic::AtomicBool, Arc},
            thread,
        };

        let success = Arc::new(AtomicBool::new(false));
        let error = Arc::new(AtomicBool::new(false));

        let thread = {
            let success = success.clone();
            let error = error.clone();

            thread::spawn(move || {
                let frames = ["/", "-", "\\", "|"];

                let mut i = 0;

                while !JSON_MODE.load(Ordering::Relaxed) {
                    print!("\r[{}] {msg} ", frames[i].purple(), msg = format!($fmt));

                    if success.load(Ordering::Relaxed) {
                        println!(
                            "\r[{check}] {msg}",
                            check = "✔".green().bold(),
                            msg = format!($fmt)
                        );

                        break;
                    }

                    if error.load(Ordering::Relaxed) {
                        println!(
                            "\r[{ballot}] {msg}",
                            ballot = "✘".red().bold(),
                            msg = format!($fmt)
                        );

                        break;
                    }

                    i = (i + 1) % frames.len();

                    let _ = std::io::stdout().flush();

                    thread::sleep(std::time::Duration::from_millis(100));
                }
            })
        };

        $crate::display::LoadingHandle::new(success, error, thread)
    }};
}

/// Struct helping with handling loading state.
pub(crate) struct LoadingHandle {
    success: Arc<AtomicBool>,
    error: Arc<AtomicBool>,
    thread: thread::JoinHandle<()>,
}

impl LoadingHandle {
    pub(super) fn new(
        success: Arc<AtomicBool>,
        error: Arc<AtomicBool>,
        thread: thread::JoinHandle<()>,
    ) -> Self {
        Self {
            success,
            error,
            thread,
        }
    }

    /// Mark the loading as successful.
    pub(crate) fn success(self) {
        if !JSON_MODE.load(Ordering::Relaxed) {
            self.success.store(true, Ordering::Relaxed);

            let _ = self.thread.join();
        }
    }

    /// Mark the loading as errored.
    pub(crate) fn error(self) {
        if !JSON_MODE.load(Ordering::Relaxed) {
            self.error.store(true, Ordering::Relaxed);

            let _ = self.thread.join();
        }
    }
}

/// If [`JSON_MODE`] is enabled, output the given data as JSON.
pub(crate) fn json_output<T: Serialize>(data: &T) -> AnyResult<(), CliError> {
    if !JSON_MODE.load(Ordering::Relaxed) {
        return Ok(());
    }

    match serde_json::to_string_pretty(data) {
        Ok(json) => {
            println!("{}", json);

            Ok(())
        }
        Err(e) => Err(CliError::Any(e.into())),
    }
}

/// Print rows under a header as a table, unless in [`JSON_MODE`].
pub(crate) fn print_table<R: Into<comfy_table::Row>>(header: Vec<&str>, rows: Vec<R>) {
    if JSON_MODE.load(Ordering::Relaxed) {
        return;
    }

    let mut table = comfy_table::Table::new();

    table
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_header(header);

    for row in rows {
        table.add_row(row);
    }

    println!("{table}");
}
