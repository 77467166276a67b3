use anyhow::Result;
use log::debug;
use roxmltree::{Document, Node};

use super::model::{Category, PackageFileEntry, PackageRecord, RepositoryCatalog};
use crate::error::ApmError;
use crate::runtime::is_contained_path;

/// Accepted `(collection, item)` element names.
const COLLECTIONS: [(&str, &str); 3] = [
    ("packages", "package"),
    ("plugins", "plugin"),
    ("scripts", "script"),
];

impl RepositoryCatalog {
    /// Parse a repository description.
    ///
    /// The whole document is rejected if it is not well-formed, if the root
    /// is not a known collection, or if any package lacks an id.
    #[tracing::instrument(skip(text))]
    pub fn parse(source: &str, text: &str) -> Result<Self> {
        let doc = Document::parse(text).map_err(|e| ApmError::catalog_parse(source, e.to_string()))?;
        let root = doc.root_element();
        let root_name = root.tag_name().name();

        let item_name = COLLECTIONS
            .iter()
            .find(|(collection, _)| *collection == root_name)
            .map(|(_, item)| *item)
            .ok_or_else(|| {
                ApmError::catalog_parse(source, format!("unexpected root element <{}>", root_name))
            })?;

        let mut catalog = RepositoryCatalog::new(source);
        for (position, node) in child_elements(root, item_name).enumerate() {
            catalog.insert(parse_package(source, position, node)?);
        }

        debug!("Parsed {} package(s) from {}", catalog.len(), source);
        Ok(catalog)
    }
}

fn parse_package(source: &str, position: usize, node: Node) -> Result<PackageRecord, ApmError> {
    let id = child_text(node, "id")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            ApmError::catalog_parse(source, format!("<{}> #{} has no id", node.tag_name().name(), position + 1))
        })?;

    let categories = child_text(node, "type")
        .map(|t| t.split_whitespace().map(Category::from).collect())
        .unwrap_or_default();

    let files = match child_elements(node, "files").next() {
        Some(files) => parse_files(source, &id, files)?,
        None => Vec::new(),
    };

    Ok(PackageRecord {
        id,
        name: child_text(node, "name"),
        overview: child_text(node, "overview"),
        description: child_text(node, "description"),
        categories,
        page_url: child_text(node, "pageURL"),
        download_url: child_text(node, "downloadURL"),
        download_mirror_url: child_text(node, "downloadMirrorURL"),
        latest_version: child_text(node, "latestVersion"),
        detail_url: child_text(node, "detailURL"),
        files,
        installer: child_text(node, "installer"),
        install_arg: child_text(node, "installArg"),
    })
}

/// Parse the `<file>` children of a `<files>` node.
///
/// Parsing stops at the first entry that has no path text or that nests
/// other elements; anything after it is ignored. A path or `archivePath`
/// that is absolute or climbs out with `..` rejects the whole document.
fn parse_files(source: &str, id: &str, files: Node) -> Result<Vec<PackageFileEntry>, ApmError> {
    let mut entries = Vec::new();

    for file in child_elements(files, "file") {
        if file.children().any(|c| c.is_element()) {
            debug!("Stopping file list at nested <file> element");
            break;
        }
        let path = element_text(file);
        if path.is_empty() {
            debug!("Stopping file list at empty <file> element");
            break;
        }
        let archive_path = file
            .attribute("archivePath")
            .filter(|p| !p.is_empty())
            .map(String::from);

        for candidate in std::iter::once(&path).chain(archive_path.as_ref()) {
            if !is_contained_path(candidate) {
                return Err(ApmError::catalog_parse(
                    source,
                    format!(
                        "{}: path {:?} must be relative and must not contain ..",
                        id, candidate
                    ),
                ));
            }
        }

        entries.push(PackageFileEntry {
            path,
            optional: flag(file, "optional"),
            is_directory: flag(file, "directory"),
            archive_path,
            uninstall_only: flag(file, "uninstallOnly"),
            obsolete: flag(file, "obsolete"),
        });
    }

    Ok(entries)
}

fn flag(node: Node, name: &str) -> bool {
    node.attribute(name)
        .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "" | "false" | "0"))
        .unwrap_or(false)
}

fn child_elements<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |c| c.is_element() && c.tag_name().name() == name)
}

fn child_text(node: Node, name: &str) -> Option<String> {
    child_elements(node, name).next().map(element_text)
}

fn element_text(node: Node) -> String {
    node.children()
        .filter_map(|c| if c.is_text() { c.text() } else { None })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLUGINS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<plugins>
  <plugin>
    <id>rikky/lsmash</id>
    <name>L-SMASH Works</name>
    <overview>Input plugin</overview>
    <type>input output</type>
    <latestVersion>r940</latestVersion>
    <downloadURL>https://example.com/lsmash.zip</downloadURL>
    <files>
      <file>plugins/lwinput.aui</file>
      <file optional="true">plugins/lwinput.ini</file>
      <file archivePath="x64/">plugins/lwmuxer.auf</file>
    </files>
  </plugin>
  <plugin>
    <id>kenkun/pack</id>
    <description></description>
    <type>filter mystery</type>
    <files>
      <file directory="true">script/pack</file>
    </files>
  </plugin>
</plugins>"#;

    #[test]
    fn test_parse_plugins_list() {
        let catalog = RepositoryCatalog::parse("https://example.com/plugins.xml", PLUGINS).unwrap();
        assert_eq!(catalog.source(), "https://example.com/plugins.xml");
        assert_eq!(catalog.len(), 2);

        let lsmash = catalog.get("rikky/lsmash").unwrap();
        assert_eq!(lsmash.name(), Some("L-SMASH Works"));
        assert_eq!(lsmash.latest_version(), Some("r940"));
        assert_eq!(lsmash.categories(), &[Category::Input, Category::Output]);
        assert_eq!(lsmash.files().len(), 3);
        assert!(lsmash.files()[1].is_optional());
        assert_eq!(lsmash.files()[2].archive_path(), Some("x64/"));
        assert!(!lsmash.files()[0].is_directory());

        let pack = catalog.get("kenkun/pack").unwrap();
        assert!(pack.files()[0].is_directory());
        assert_eq!(
            pack.categories(),
            &[Category::Filter, Category::Unknown("mystery".into())]
        );
    }

    #[test]
    fn test_absent_fields_are_unset_and_empty_fields_are_empty() {
        let catalog = RepositoryCatalog::parse("repo", PLUGINS).unwrap();
        let pack = catalog.get("kenkun/pack").unwrap();

        assert_eq!(pack.description(), Some(""));
        assert_eq!(pack.name(), None);
        assert_eq!(pack.overview(), None);
        assert_eq!(pack.latest_version(), None);
        assert_eq!(pack.page_url(), None);
        assert_eq!(pack.installer(), None);
        assert_eq!(pack.display_name(), "kenkun/pack");
    }

    #[test]
    fn test_parse_scripts_list_with_installer_fields() {
        let xml = r#"<scripts>
  <script>
    <id>tim/anm</id>
    <type>animation camera</type>
    <installer>setup.exe</installer>
    <installArg>/S</installArg>
    <files><file>script/tim.anm</file></files>
  </script>
</scripts>"#;
        let catalog = RepositoryCatalog::parse("scripts.xml", xml).unwrap();
        let script = catalog.get("tim/anm").unwrap();
        assert_eq!(script.installer(), Some("setup.exe"));
        assert_eq!(script.install_arg(), Some("/S"));
        assert_eq!(script.categories(), &[Category::Animation, Category::Camera]);
    }

    #[test]
    fn test_every_package_id_yields_one_record() {
        let xml = r#"<packages>
  <package><id>a</id></package>
  <package><id>b</id></package>
  <package><id>c</id></package>
</packages>"#;
        let catalog = RepositoryCatalog::parse("repo", xml).unwrap();
        let ids: Vec<_> = catalog.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(catalog.get("a").unwrap().files().is_empty());
    }

    #[test]
    fn test_malformed_document_is_rejected() {
        let err = RepositoryCatalog::parse("repo", "<plugins><plugin><id>a</id></plugins>").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApmError>(),
            Some(ApmError::CatalogParse { repository, .. }) if repository == "repo"
        ));
    }

    #[test]
    fn test_unknown_root_is_rejected() {
        let err = RepositoryCatalog::parse("repo", "<mods><mod><id>a</id></mod></mods>").unwrap_err();
        assert!(err.to_string().contains("unexpected root element <mods>"));
    }

    #[test]
    fn test_package_without_id_rejects_whole_catalog() {
        let xml = r#"<plugins>
  <plugin><id>good</id></plugin>
  <plugin><name>nameless</name></plugin>
</plugins>"#;
        let err = RepositoryCatalog::parse("repo", xml).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApmError>(),
            Some(ApmError::CatalogParse { .. })
        ));
    }

    #[test]
    fn test_file_list_stops_at_first_malformed_entry() {
        let xml = r#"<plugins><plugin><id>p</id><files>
  <file>a.auf</file>
  <file optional="1">b.auf</file>
  <file/>
  <file>c.auf</file>
</files></plugin></plugins>"#;
        let catalog = RepositoryCatalog::parse("repo", xml).unwrap();
        let files = catalog.get("p").unwrap().files();
        let paths: Vec<_> = files.iter().map(|f| f.path()).collect();
        assert_eq!(paths, vec!["a.auf", "b.auf"]);
        assert!(files[1].is_optional());
    }

    #[test]
    fn test_file_list_stops_at_nested_element() {
        let xml = r#"<plugins><plugin><id>p</id><files>
  <file>a.auf</file>
  <file><path>b.auf</path></file>
  <file>c.auf</file>
</files></plugin></plugins>"#;
        let catalog = RepositoryCatalog::parse("repo", xml).unwrap();
        assert_eq!(catalog.get("p").unwrap().files().len(), 1);
    }

    #[test]
    fn test_file_flags() {
        let xml = r#"<plugins><plugin><id>p</id><files>
  <file optional="false" directory="0" archivePath="">a.auf</file>
  <file obsolete="true">old.auf</file>
  <file uninstallOnly="true">a.ini</file>
</files></plugin></plugins>"#;
        let catalog = RepositoryCatalog::parse("repo", xml).unwrap();
        let files = catalog.get("p").unwrap().files();

        assert!(!files[0].is_optional());
        assert!(!files[0].is_directory());
        assert_eq!(files[0].archive_path(), None);
        assert!(files[1].is_obsolete());
        assert!(files[2].is_uninstall_only());
    }

    #[test]
    fn test_file_path_outside_root_rejects_whole_catalog() {
        for file in [
            "<file>/tmp/victim.auf</file>",
            r#"<file directory="true">../victim</file>"#,
            "<file>plugins/../../victim.auf</file>",
        ] {
            let xml = format!(
                "<plugins><plugin><id>p</id><files>{}</files></plugin></plugins>",
                file
            );
            let err = RepositoryCatalog::parse("repo", &xml).unwrap_err();
            assert!(
                matches!(err.downcast_ref::<ApmError>(), Some(ApmError::CatalogParse { .. })),
                "{} was accepted",
                file
            );
        }
    }

    #[test]
    fn test_archive_path_outside_staged_tree_rejects_whole_catalog() {
        for archive_path in ["/etc", "../outside", "x64/../../up"] {
            let file = format!(r#"<file archivePath="{}">a.auf</file>"#, archive_path);
            let xml = format!(
                "<plugins><plugin><id>p</id><files>{}</files></plugin></plugins>",
                file
            );
            let err = RepositoryCatalog::parse("repo", &xml).unwrap_err();
            assert!(err.to_string().contains("must be relative"), "{}", err);
        }
    }
}
