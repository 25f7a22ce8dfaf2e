use crate::scan::Summary;
use crate::ui::progress_message::{ProgressMessage, ProgressPhase};
use crate::ui::{classification, theme, Icons};
use indicatif::{HumanDuration, MultiProgress, ProgressBar};
use owo_colors::OwoColorize;
use std::thread;
use std::time::Duration;

pub struct ProgressManager {
    mp: MultiProgress,
    _handle: thread::JoinHandle<()>,
}

fn visible(bar: ProgressBar) -> ProgressBar {
    if console::Term::stdout().is_term() {
        bar
    } else {
        ProgressBar::hidden()
    }
}

impl ProgressManager {
    pub fn new() -> (Self, crossbeam::channel::Sender<ProgressMessage>) {
        let (tx, rx) = crossbeam::channel::unbounded::<ProgressMessage>();

        let mp = MultiProgress::new();

        let inventory = visible(mp.add(ProgressBar::new_spinner().with_message("Reading asset inventory")));
        let marking = visible(mp.add(ProgressBar::new(0).with_message("Scanning content")));
        let sweeping = visible(mp.add(ProgressBar::new_spinner().with_message("Sweeping")));

        let handle = thread::spawn(move || {
            for msg in rx {
                match msg {
                    ProgressMessage::Started {
                        phase: ProgressPhase::Inventory,
                        ..
                    } => {
                        inventory.enable_steady_tick(Duration::from_millis(100));
                    }
                    ProgressMessage::Started {
                        phase: ProgressPhase::Marking,
                        total,
                    } => {
                        marking.set_length(total as u64);
                    }
                    ProgressMessage::Started {
                        phase: ProgressPhase::Sweeping,
                        ..
                    } => {
                        sweeping.enable_steady_tick(Duration::from_millis(100));
                    }
                    ProgressMessage::Progress {
                        phase: ProgressPhase::Marking,
                        current,
                        label,
                    } => {
                        marking.set_position(current as u64);
                        if let Some(ref l) = label {
                            marking.set_message(format!("Scanning: {}", l));
                        }
                    }
                    ProgressMessage::Finished {
                        phase: ProgressPhase::Inventory,
                    } => {
                        inventory.finish_with_message("Done");
                    }
                    ProgressMessage::Finished {
                        phase: ProgressPhase::Marking,
                    } => {
                        marking.finish_with_message("Done");
                    }
                    ProgressMessage::Finished {
                        phase: ProgressPhase::Sweeping,
                    } => {
                        sweeping.finish_with_message("Done");
                    }
                    _ => {}
                }
            }
        });

        (Self { mp, _handle: handle }, tx)
    }

    pub fn clear(&self) {
        self.mp.clear().ok();
    }

    pub fn finish_with_summary(&self, duration: Duration, summary: &Summary) {
        self.clear();
        println!();
        println!(
            "{} {}",
            Icons::CHECK.style(theme().success),
            format!("Complete in {}", HumanDuration(duration)).style(theme().success)
        );
        println!("  {}", classification(summary));
    }
}

pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_message(message.to_string());
        if console::Term::stdout().is_term() {
            pb.enable_steady_tick(Duration::from_millis(100));
        }
        Self { pb }
    }

    pub fn finish_with_message(&self, msg: &str) {
        self.pb.finish_with_message(msg.to_string());
    }
}
