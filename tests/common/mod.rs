use std::collections::BTreeSet;
use std::sync::{LazyLock, Mutex};

use flexi_logger::{Logger, LoggerHandle};

/// Adjacency-set forest oracle: linear-time everything, used to check
/// connectivity and component membership.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct NaiveForest {
    adj: Vec<BTreeSet<usize>>,
}

#[allow(dead_code)]
impl NaiveForest {
    pub fn new(n: usize) -> Self {
        Self {
            adj: vec![BTreeSet::new(); n],
        }
    }

    pub fn has_edge(&self, u: usize, v: usize) -> bool {
        self.adj[u].contains(&v)
    }

    pub fn link(&mut self, u: usize, v: usize) -> bool {
        if self.connected(u, v) {
            return false;
        }
        self.adj[u].insert(v);
        self.adj[v].insert(u);
        true
    }

    pub fn cut(&mut self, u: usize, v: usize) -> bool {
        if !self.has_edge(u, v) {
            return false;
        }
        self.adj[u].remove(&v);
        self.adj[v].remove(&u);
        true
    }

    pub fn component(&self, u: usize) -> BTreeSet<usize> {
        let mut seen = BTreeSet::from([u]);
        let mut stack = vec![u];
        while let Some(w) = stack.pop() {
            for &x in &self.adj[w] {
                if seen.insert(x) {
                    stack.push(x);
                }
            }
        }
        seen
    }

    pub fn connected(&self, u: usize, v: usize) -> bool {
        self.component(u).contains(&v)
    }
}

#[allow(dead_code)]
pub static LOGGER: LazyLock<Mutex<LoggerHandle>> = LazyLock::new(|| {
    Mutex::new(
        Logger::try_with_env_or_str("info")
            .unwrap()
            .write_mode(flexi_logger::WriteMode::SupportCapture)
            .log_to_stdout()
            .set_palette("196;208;3;7;8".to_owned())
            .format(|w, now, record| {
                let style = flexi_logger::style(record.level());
                write!(
                    w,
                    "{} {pref}[{}] {}{suf}",
                    now.format("%H:%M:%S"),
                    &record.level().as_str()[0..1],
                    record.args(),
                    pref = style.prefix(),
                    suf = style.suffix(),
                )
            })
            .start()
            .unwrap(),
    )
});

#[allow(dead_code)]
pub fn init_logger() {
    let _ = &*LOGGER;
}
