//! Platform selection: rank host tags once at startup, then pick the most
//! specific variant of a tagged lifecycle block.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::process::Command;
use tracing::{debug, instrument};

/// Immutable host-tag rank table, populated once at process start
/// (spec §3 "Tag", §4.A).
#[derive(Debug, Clone)]
pub struct TagTable {
    ranks: HashMap<String, i32>,
}

impl TagTable {
    /// Probe the host once and build the rank table.
    ///
    /// Mirrors the teacher's one-shot `Platform::detect` probe: filesystem
    /// markers, an environment variable, and a single `uname -a` call, never
    /// repeated after this constructor returns.
    #[instrument]
    pub fn detect() -> Self {
        let mut ranks = HashMap::new();
        ranks.insert("all".to_string(), 0);
        ranks.insert("any".to_string(), 0);

        if std::path::Path::new("/bin/bash").exists() || std::path::Path::new("/proc").exists() {
            ranks.insert("posix".to_string(), 3);
        }
        if std::path::Path::new("/proc").exists() {
            ranks.insert("linux".to_string(), 10);
        }
        if std::path::Path::new("/usr/bin/apt-get").exists() {
            ranks.insert("debian".to_string(), 15);
        }
        if std::env::var_os("WINDIR").is_some() || std::env::var_os("SystemRoot").is_some() {
            ranks.insert("windows".to_string(), 10);
        }

        if let Ok(output) = Command::new("uname").arg("-a").output() {
            let banner = String::from_utf8_lossy(&output.stdout).to_lowercase();
            debug!(banner = %banner, "uname probe");
            for (marker, tag, rank) in [
                ("ubuntu", "ubuntu", 20),
                ("darwin", "darwin", 10),
                ("raspbian", "raspbian", 20),
                ("qnx", "qnx", 10),
                ("cygwin", "cygwin", 10),
                ("freebsd", "freebsd", 10),
                ("solaris", "solaris", 10),
                ("sunos", "solaris", 10),
            ] {
                if banner.contains(marker) {
                    ranks.insert(tag.to_string(), rank);
                }
            }
        }

        if let Ok(hostname) = hostname() {
            ranks.insert(hostname, 99);
        }

        debug!(ranks = ?ranks, "tag table populated");
        Self { ranks }
    }

    /// Build a table directly from a rank map, bypassing host probing.
    /// Used by tests and by callers that already know the host tags.
    pub fn from_ranks(ranks: HashMap<String, i32>) -> Self {
        Self { ranks }
    }

    /// `rank(tag)` returns -1 for unknown tags (spec §3).
    pub fn rank(&self, tag: &str) -> i32 {
        self.ranks.get(tag).copied().unwrap_or(-1)
    }
}

#[cfg(unix)]
fn hostname() -> std::io::Result<String> {
    let output = Command::new("hostname").output()?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(not(unix))]
fn hostname() -> std::io::Result<String> {
    std::env::var("COMPUTERNAME")
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::NotFound, "no hostname"))
}

/// Pick the highest-ranked child of a tag-keyed map.
///
/// Ties are broken by insertion order (first wins), which is why callers
/// pass an `IndexMap` rather than a `HashMap`. If no children have positive
/// rank, the `all`/`any` child is returned if present, else the first
/// child, else `None`. Pure function of its inputs (Testable Property 4).
pub fn pick_by_os<'a, T>(children: &'a IndexMap<String, T>, tags: &TagTable) -> Option<&'a T> {
    let mut best: Option<(&String, &T, i32)> = None;
    for (tag, value) in children {
        let rank = tags.rank(tag);
        if rank > 0 {
            match &best {
                Some((_, _, best_rank)) if *best_rank >= rank => {}
                _ => best = Some((tag, value, rank)),
            }
        }
    }
    if let Some((_, value, _)) = best {
        return Some(value);
    }

    for fallback in ["all", "any"] {
        if let Some(value) = children.get(fallback) {
            return Some(value);
        }
    }

    children.values().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranks(pairs: &[(&str, i32)]) -> TagTable {
        TagTable::from_ranks(pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect())
    }

    #[test]
    fn picks_highest_rank() {
        let tags = ranks(&[("posix", 3), ("ubuntu", 20), ("all", 0)]);
        let mut children = IndexMap::new();
        children.insert("posix".to_string(), "A");
        children.insert("ubuntu".to_string(), "B");
        children.insert("all".to_string(), "C");
        assert_eq!(pick_by_os(&children, &tags), Some(&"B"));
    }

    #[test]
    fn falls_back_to_all_when_nothing_positive() {
        let tags = ranks(&[("all", 0)]);
        let mut children = IndexMap::new();
        children.insert("windows".to_string(), "A");
        children.insert("all".to_string(), "C");
        assert_eq!(pick_by_os(&children, &tags), Some(&"C"));
    }

    #[test]
    fn falls_back_to_first_child_when_no_all() {
        let tags = ranks(&[]);
        let mut children = IndexMap::new();
        children.insert("freebsd".to_string(), "A");
        children.insert("solaris".to_string(), "B");
        assert_eq!(pick_by_os(&children, &tags), Some(&"A"));
    }

    #[test]
    fn ties_are_broken_by_insertion_order() {
        let tags = ranks(&[("posix", 5), ("linux", 5)]);
        let mut children = IndexMap::new();
        children.insert("linux".to_string(), "first");
        children.insert("posix".to_string(), "second");
        assert_eq!(pick_by_os(&children, &tags), Some(&"first"));
    }

    #[test]
    fn unknown_tag_ranks_negative_one() {
        let tags = ranks(&[("all", 0)]);
        assert_eq!(tags.rank("nonexistent"), -1);
    }

    #[test]
    fn selection_is_deterministic_across_repeated_calls() {
        let tags = ranks(&[("posix", 3), ("ubuntu", 20), ("all", 0)]);
        let mut children = IndexMap::new();
        children.insert("posix".to_string(), "A");
        children.insert("ubuntu".to_string(), "B");
        children.insert("all".to_string(), "C");
        for _ in 0..5 {
            assert_eq!(pick_by_os(&children, &tags), Some(&"B"));
        }
    }
}
