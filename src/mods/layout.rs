//! Archive entry placement and mod directory structure checks
//!
//! Entry placement is a pure function over the entry's archive path, driven by
//! [`PLACEMENT_RULES`]. Structure checks are split into a read-only
//! [`assess_layout`] and an explicit [`reorganize`] step.

use crate::games::{
    ARCHIVE_MOD_DIR, CANONICAL_ROOTS, CET_DIR, CONTENT_EXTENSIONS, KNOWN_PLUGINS, ORGANIZABLE_PLUGINS,
};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Sanitize an archive entry name to prevent directory traversal.
///
/// Backslashes become `/`; empty, `.` and `..` segments are dropped.
pub fn sanitize_path(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect::<Vec<_>>()
        .join("/")
}

/// A sanitized archive entry path, split for rule matching
#[derive(Debug)]
pub struct EntryPath<'a> {
    pub path: &'a str,
    pub file_name: &'a str,
    pub stem: &'a str,
    /// Lowercased extension without the dot, empty when there is none
    pub extension: String,
    pub first_segment: &'a str,
    pub is_root_level: bool,
}

impl<'a> EntryPath<'a> {
    fn parse(path: &'a str) -> Self {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let (stem, extension) = match file_name.rfind('.') {
            Some(idx) if idx > 0 => (&file_name[..idx], file_name[idx + 1..].to_ascii_lowercase()),
            _ => (file_name, String::new()),
        };
        Self {
            path,
            file_name,
            stem,
            extension,
            first_segment: path.split('/').next().unwrap_or(path),
            is_root_level: !path.contains('/'),
        }
    }

    fn has_ext(&self, ext: &str) -> bool {
        self.extension == ext
    }

    fn name_is(&self, name: &str) -> bool {
        self.file_name.eq_ignore_ascii_case(name)
    }

    fn name_contains(&self, needle: &str) -> bool {
        self.file_name
            .to_ascii_lowercase()
            .contains(&needle.to_ascii_lowercase())
    }
}

/// Which placement rule routed an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementRule {
    /// Root-level `.archive` file
    PackedArchive,
    /// Already under a canonical root directory
    CanonicalRoot,
    /// Root-level RED4ext plugin DLL with a known name
    KnownPlugin,
    /// Redscript source, flattened into `r6/scripts`
    RedscriptSource,
    /// Cyber Engine Tweaks Lua mod
    CetScript,
    /// Cyber Engine Tweaks loader (`version.dll`)
    CetLoader,
    /// RED4ext loader or its config
    Red4extCore,
    /// Redscript compiler library
    RedscriptCompiler,
    /// Engine configuration file
    EngineConfig,
    /// TweakXL data file
    Tweak,
    /// Anything else keeps its path
    Passthrough,
}

type Predicate = fn(&EntryPath) -> bool;

fn is_packed_archive(e: &EntryPath) -> bool {
    e.is_root_level && e.has_ext("archive")
}

fn is_under_canonical_root(e: &EntryPath) -> bool {
    CANONICAL_ROOTS
        .iter()
        .any(|root| e.first_segment.eq_ignore_ascii_case(root))
}

fn is_known_plugin(e: &EntryPath) -> bool {
    e.is_root_level && e.has_ext("dll") && KNOWN_PLUGINS.iter().any(|p| e.name_contains(p))
}

fn is_redscript_source(e: &EntryPath) -> bool {
    e.has_ext("reds")
}

fn is_cet_script(e: &EntryPath) -> bool {
    e.has_ext("lua")
}

fn is_cet_loader(e: &EntryPath) -> bool {
    e.is_root_level && e.name_is("version.dll")
}

fn is_red4ext_core(e: &EntryPath) -> bool {
    e.is_root_level && (e.name_is("RED4ext.dll") || e.name_is("config.ini"))
}

fn is_redscript_compiler(e: &EntryPath) -> bool {
    e.is_root_level && e.name_is("redscript.dll")
}

fn is_engine_config(e: &EntryPath) -> bool {
    e.name_contains("config") && (e.has_ext("ini") || e.has_ext("xml"))
}

fn is_tweak(e: &EntryPath) -> bool {
    e.has_ext("yaml") || e.has_ext("tweak")
}

fn always(_: &EntryPath) -> bool {
    true
}

/// Ordered placement rules; the first matching predicate decides the destination.
pub static PLACEMENT_RULES: [(PlacementRule, Predicate); 11] = [
    (PlacementRule::PackedArchive, is_packed_archive),
    (PlacementRule::CanonicalRoot, is_under_canonical_root),
    (PlacementRule::KnownPlugin, is_known_plugin),
    (PlacementRule::RedscriptSource, is_redscript_source),
    (PlacementRule::CetScript, is_cet_script),
    (PlacementRule::CetLoader, is_cet_loader),
    (PlacementRule::Red4extCore, is_red4ext_core),
    (PlacementRule::RedscriptCompiler, is_redscript_compiler),
    (PlacementRule::EngineConfig, is_engine_config),
    (PlacementRule::Tweak, is_tweak),
    (PlacementRule::Passthrough, always),
];

impl PlacementRule {
    /// Destination of `entry` under the mod root, `/`-separated
    pub fn relocate(&self, entry: &EntryPath) -> String {
        match self {
            PlacementRule::PackedArchive => format!("{}/{}", ARCHIVE_MOD_DIR, entry.file_name),
            PlacementRule::CanonicalRoot | PlacementRule::Passthrough => entry.path.to_string(),
            PlacementRule::KnownPlugin => {
                format!("red4ext/plugins/{}/{}", entry.stem, entry.file_name)
            }
            PlacementRule::RedscriptSource => format!("r6/scripts/{}", entry.file_name),
            PlacementRule::CetScript => format!("{}/mods/{}", CET_DIR, entry.path),
            PlacementRule::CetLoader => format!("{}/{}", CET_DIR, entry.file_name),
            PlacementRule::Red4extCore => format!("red4ext/{}", entry.file_name),
            PlacementRule::RedscriptCompiler => format!("engine/{}", entry.file_name),
            PlacementRule::EngineConfig => format!("engine/config/platform/pc/{}", entry.path),
            PlacementRule::Tweak => format!("r6/tweaks/{}", entry.path),
        }
    }
}

/// Placement decision for a single archive entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub rule: PlacementRule,
    pub destination: String,
}

/// Route an archive entry name to its place in the mod root.
///
/// Returns `None` for entries that sanitize to nothing (e.g. `../`).
pub fn place_entry(raw: &str) -> Option<Placement> {
    let sanitized = sanitize_path(raw);
    if sanitized.is_empty() {
        return None;
    }
    let entry = EntryPath::parse(&sanitized);
    PLACEMENT_RULES
        .iter()
        .find(|(_, applies)| applies(&entry))
        .map(|(rule, _)| Placement {
            rule: *rule,
            destination: rule.relocate(&entry),
        })
}

/// Destination path only, see [`place_entry`]
pub fn normalize_entry_path(raw: &str) -> Option<String> {
    place_entry(raw).map(|p| p.destination)
}

/// Result of inspecting an extracted mod root
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutAssessment {
    /// At least one canonical root directory exists
    Canonical,
    /// Root-level `.archive` files that belong in `archive/pc/mod`
    LooseArchives(Vec<PathBuf>),
    /// Root-level plugin DLLs that belong under `red4ext/` or `engine/`
    LoosePlugins(Vec<PathBuf>),
    /// No canonical layout, but recognized mod content is present
    RecognizedContent,
    Invalid,
}

impl LayoutAssessment {
    pub fn is_valid(&self) -> bool {
        !matches!(self, LayoutAssessment::Invalid)
    }

    pub fn needs_reorganize(&self) -> bool {
        matches!(
            self,
            LayoutAssessment::LooseArchives(_) | LayoutAssessment::LoosePlugins(_)
        )
    }
}

fn root_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn file_name_of(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Inspect a mod root without touching it.
pub fn assess_layout(root: &Path) -> io::Result<LayoutAssessment> {
    if CANONICAL_ROOTS.iter().any(|dir| root.join(dir).is_dir()) {
        return Ok(LayoutAssessment::Canonical);
    }

    let files = root_files(root)?;

    let archives: Vec<PathBuf> = files
        .iter()
        .filter(|p| has_extension(p, "archive"))
        .cloned()
        .collect();
    if !archives.is_empty() {
        return Ok(LayoutAssessment::LooseArchives(archives));
    }

    let plugins: Vec<PathBuf> = files
        .iter()
        .filter(|p| has_extension(p, "dll"))
        .filter(|p| {
            let name = file_name_of(p).to_ascii_lowercase();
            ORGANIZABLE_PLUGINS
                .iter()
                .any(|plugin| name.contains(&plugin.to_ascii_lowercase()))
        })
        .cloned()
        .collect();
    if !plugins.is_empty() {
        return Ok(LayoutAssessment::LoosePlugins(plugins));
    }

    let has_content = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .any(|e| {
            CONTENT_EXTENSIONS
                .iter()
                .any(|ext| has_extension(e.path(), ext))
        });

    Ok(if has_content {
        LayoutAssessment::RecognizedContent
    } else {
        LayoutAssessment::Invalid
    })
}

/// Target directory for a loose plugin DLL, relative to the mod root
fn plugin_target_dir(file_name: &str) -> String {
    if file_name.eq_ignore_ascii_case("RED4ext.dll") {
        "red4ext".to_string()
    } else if file_name.eq_ignore_ascii_case("redscript.dll") {
        "engine".to_string()
    } else if file_name.eq_ignore_ascii_case("version.dll") {
        CET_DIR.to_string()
    } else {
        let stem = file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(file_name);
        format!("red4ext/plugins/{}", stem)
    }
}

/// Move loose files named by `assessment` into their canonical directories.
///
/// Files that have already been moved are skipped, so running this twice is
/// harmless. Returns the number of files moved.
pub fn reorganize(root: &Path, assessment: &LayoutAssessment) -> io::Result<usize> {
    let moves: Vec<(&PathBuf, PathBuf)> = match assessment {
        LayoutAssessment::LooseArchives(files) => files
            .iter()
            .map(|f| (f, root.join(ARCHIVE_MOD_DIR)))
            .collect(),
        LayoutAssessment::LoosePlugins(files) => files
            .iter()
            .map(|f| (f, root.join(plugin_target_dir(file_name_of(f)))))
            .collect(),
        _ => return Ok(0),
    };

    let mut moved = 0;
    for (source, target_dir) in moves {
        if !source.is_file() {
            continue;
        }
        std::fs::create_dir_all(&target_dir)?;
        let dest = target_dir.join(file_name_of(source));
        std::fs::rename(source, &dest)?;
        tracing::debug!("Moved {} -> {}", source.display(), dest.display());
        moved += 1;
    }

    Ok(moved)
}

/// Assess, reorganize if needed, and re-assess an extracted mod root.
///
/// Returns the final assessment; anything other than `Invalid` is importable.
pub fn validate(root: &Path) -> io::Result<LayoutAssessment> {
    let assessment = assess_layout(root)?;
    if !assessment.needs_reorganize() {
        return Ok(assessment);
    }

    let moved = reorganize(root, &assessment)?;
    tracing::info!("Reorganized {} loose files in {}", moved, root.display());
    assess_layout(root)
}
