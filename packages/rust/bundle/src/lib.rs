//! On-disk bundle assembly.
//!
//! A bundle is a `<Name>.docset` directory with the fixed layout viewers
//! expect:
//!
//! ```text
//! <Name>.docset/
//!   Contents/
//!     Info.plist
//!     Resources/
//!       docSet.dsidx
//!       Documents/
//!         <pages...>
//! ```
//!
//! [`BundleLayout::create`] replaces any existing bundle of the same name,
//! so a re-run never leaves orphaned pages from a previous run.

use std::fs::File;
use std::path::{Component, Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::{debug, info, instrument};

use docpack_shared::{BundleMeta, DocpackError, Result};

/// Documents-relative subpath of the lookup database within `Contents/Resources`.
const INDEX_FILE_NAME: &str = "docSet.dsidx";

/// Filesystem layout of one bundle under construction.
pub struct BundleLayout {
    docset_dir: PathBuf,
    name: String,
}

impl BundleLayout {
    /// Create a fresh `<name>.docset` under `output_dir`, replacing any
    /// existing bundle with the same name.
    pub fn create(output_dir: &Path, name: &str) -> Result<Self> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(DocpackError::validation(format!(
                "invalid bundle name: {name:?}"
            )));
        }

        let docset_dir = output_dir.join(format!("{name}.docset"));
        if docset_dir.exists() {
            debug!(path = %docset_dir.display(), "removing previous bundle");
            std::fs::remove_dir_all(&docset_dir).map_err(|e| DocpackError::io(&docset_dir, e))?;
        }

        let layout = Self {
            docset_dir,
            name: name.to_string(),
        };
        std::fs::create_dir_all(layout.documents_dir())
            .map_err(|e| DocpackError::io(layout.documents_dir(), e))?;
        Ok(layout)
    }

    /// Root of the `.docset` directory.
    pub fn docset_dir(&self) -> &Path {
        &self.docset_dir
    }

    /// Directory holding the captured pages.
    pub fn documents_dir(&self) -> PathBuf {
        self.docset_dir.join("Contents/Resources/Documents")
    }

    /// Path of the lookup database.
    pub fn index_path(&self) -> PathBuf {
        self.docset_dir.join("Contents/Resources").join(INDEX_FILE_NAME)
    }

    /// Path of the metadata plist.
    pub fn plist_path(&self) -> PathBuf {
        self.docset_dir.join("Contents/Info.plist")
    }

    /// Write one page under the documents root, creating parent directories
    /// as needed.
    pub fn write_page(&self, rel_path: &str, html: &str) -> Result<()> {
        let target = self.resolve_documents_path(rel_path)?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DocpackError::io(parent, e))?;
        }
        std::fs::write(&target, html).map_err(|e| DocpackError::io(&target, e))?;
        debug!(page = rel_path, "wrote page");
        Ok(())
    }

    /// Write an auxiliary resource (e.g. a bundled stylesheet) at the
    /// documents root.
    pub fn write_resource(&self, file_name: &str, contents: &str) -> Result<()> {
        self.write_page(file_name, contents)
    }

    /// Whether a page exists at `rel_path` under the documents root.
    pub fn contains_page(&self, rel_path: &str) -> bool {
        match self.resolve_documents_path(rel_path) {
            Ok(path) => path.is_file(),
            Err(_) => false,
        }
    }

    /// Write the bundle's `Info.plist` from its metadata descriptor.
    pub fn write_metadata(&self, meta: &BundleMeta) -> Result<()> {
        let plist = render_plist(meta);
        let path = self.plist_path();
        std::fs::write(&path, plist).map_err(|e| DocpackError::io(&path, e))?;
        Ok(())
    }

    /// Compress the bundle into `<name>.tgz` next to the `.docset` directory.
    #[instrument(skip_all, fields(bundle = %self.name))]
    pub fn archive(&self) -> Result<PathBuf> {
        let parent = self
            .docset_dir
            .parent()
            .ok_or_else(|| DocpackError::Archive("bundle has no parent directory".into()))?;
        let archive_path = parent.join(format!("{}.tgz", self.name));

        let file =
            File::create(&archive_path).map_err(|e| DocpackError::io(&archive_path, e))?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        builder
            .append_dir_all(format!("{}.docset", self.name), &self.docset_dir)
            .map_err(|e| DocpackError::Archive(e.to_string()))?;
        builder
            .into_inner()
            .and_then(GzEncoder::finish)
            .map_err(|e| DocpackError::Archive(e.to_string()))?;

        info!(path = %archive_path.display(), "wrote archive");
        Ok(archive_path)
    }

    /// Resolve a documents-relative path, rejecting anything that would
    /// escape the documents root.
    fn resolve_documents_path(&self, rel_path: &str) -> Result<PathBuf> {
        let rel = Path::new(rel_path);
        let escapes = rel.components().any(|c| {
            !matches!(c, Component::Normal(_) | Component::CurDir)
        });
        if rel_path.is_empty() || escapes {
            return Err(DocpackError::validation(format!(
                "invalid page path: {rel_path:?}"
            )));
        }
        Ok(self.documents_dir().join(rel))
    }
}

/// Render the metadata plist. Key names are part of the docset contract.
fn render_plist(meta: &BundleMeta) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>CFBundleIdentifier</key>
    <string>{identifier}</string>
    <key>CFBundleName</key>
    <string>{name}</string>
    <key>DocSetPlatformFamily</key>
    <string>{keyword}</string>
    <key>isDashDocset</key>
    <true/>
    <key>dashIndexFilePath</key>
    <string>{index_page}</string>
    <key>DashDocSetFallbackURL</key>
    <string>{fallback_url}</string>
    <key>DashDocSetKeyword</key>
    <string>{keyword}</string>
</dict>
</plist>
"#,
        identifier = xml_escape(&meta.identifier),
        name = xml_escape(&meta.name),
        keyword = xml_escape(&meta.keyword),
        index_page = xml_escape(&meta.index_page),
        fallback_url = xml_escape(&meta.fallback_url),
    )
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_output_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("docpack-bundle-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn meta() -> BundleMeta {
        BundleMeta {
            identifier: "example-docs".into(),
            name: "Example".into(),
            keyword: "example".into(),
            fallback_url: "https://docs.example.com/".into(),
            index_page: "index.html".into(),
        }
    }

    #[test]
    fn creates_expected_layout() {
        let out = temp_output_dir();
        let layout = BundleLayout::create(&out, "Example").unwrap();

        assert!(layout.documents_dir().is_dir());
        assert_eq!(
            layout.index_path(),
            out.join("Example.docset/Contents/Resources/docSet.dsidx")
        );
        assert_eq!(
            layout.plist_path(),
            out.join("Example.docset/Contents/Info.plist")
        );

        std::fs::remove_dir_all(&out).ok();
    }

    #[test]
    fn writes_nested_pages() {
        let out = temp_output_dir();
        let layout = BundleLayout::create(&out, "Example").unwrap();

        layout
            .write_page("guide/intro.html", "<html>intro</html>")
            .unwrap();
        assert!(layout.contains_page("guide/intro.html"));
        assert!(!layout.contains_page("guide/missing.html"));

        let on_disk =
            std::fs::read_to_string(layout.documents_dir().join("guide/intro.html")).unwrap();
        assert_eq!(on_disk, "<html>intro</html>");

        std::fs::remove_dir_all(&out).ok();
    }

    #[test]
    fn rejects_escaping_page_paths() {
        let out = temp_output_dir();
        let layout = BundleLayout::create(&out, "Example").unwrap();

        assert!(layout.write_page("../outside.html", "x").is_err());
        assert!(layout.write_page("/etc/passwd", "x").is_err());
        assert!(layout.write_page("", "x").is_err());

        std::fs::remove_dir_all(&out).ok();
    }

    #[test]
    fn recreate_removes_previous_pages() {
        let out = temp_output_dir();

        let layout = BundleLayout::create(&out, "Example").unwrap();
        layout.write_page("stale.html", "<html>old</html>").unwrap();

        let layout = BundleLayout::create(&out, "Example").unwrap();
        assert!(!layout.contains_page("stale.html"));

        std::fs::remove_dir_all(&out).ok();
    }

    #[test]
    fn plist_carries_metadata() {
        let out = temp_output_dir();
        let layout = BundleLayout::create(&out, "Example").unwrap();
        layout.write_metadata(&meta()).unwrap();

        let plist = std::fs::read_to_string(layout.plist_path()).unwrap();
        assert!(plist.contains("<string>example-docs</string>"));
        assert!(plist.contains("<string>Example</string>"));
        assert!(plist.contains("<key>isDashDocset</key>"));
        assert!(plist.contains("<string>index.html</string>"));
        assert!(plist.contains("<string>https://docs.example.com/</string>"));

        std::fs::remove_dir_all(&out).ok();
    }

    #[test]
    fn archive_written_beside_docset() {
        let out = temp_output_dir();
        let layout = BundleLayout::create(&out, "Example").unwrap();
        layout.write_page("index.html", "<html>x</html>").unwrap();
        layout.write_metadata(&meta()).unwrap();

        let archive = layout.archive().unwrap();
        assert_eq!(archive, out.join("Example.tgz"));
        assert!(archive.is_file());
        assert!(std::fs::metadata(&archive).unwrap().len() > 0);

        std::fs::remove_dir_all(&out).ok();
    }

    #[test]
    fn invalid_bundle_names_rejected() {
        let out = temp_output_dir();
        assert!(BundleLayout::create(&out, "").is_err());
        assert!(BundleLayout::create(&out, "a/b").is_err());
        std::fs::remove_dir_all(&out).ok();
    }
}
