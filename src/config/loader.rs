use super::MappingConfig;
use crate::{Error, Result};

use fxhash::FxHashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Resource scheme of an `import` element. A resource without a scheme
/// is a fatal configuration error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Scheme {
    Classpath,
    File,
}

impl Scheme {
    fn split(resource: &str) -> Result<(Scheme, &str)> {
        match resource.split_once(':') {
            Some(("classpath", rest)) => Ok((Scheme::Classpath, rest)),
            Some(("file", rest)) => Ok((Scheme::File, rest)),
            _ => Err(Error::MalformedMapping(format!(
                "import '{}' is missing a classpath: or file: scheme",
                resource
            ))),
        }
    }
}

/// Maps an import resource name to its mapping document text.
pub trait ImportResolver {
    fn resolve(&self, scheme: Scheme, resource: &str) -> Result<String>;
}

/// Resolves `file:` imports relative to a base directory. `classpath:`
/// resources have no filesystem equivalent here and fail to resolve.
pub struct FsImportResolver {
    base: PathBuf,
}

impl FsImportResolver {
    pub fn new<P: AsRef<Path>>(base: P) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }
}

impl ImportResolver for FsImportResolver {
    fn resolve(&self, scheme: Scheme, resource: &str) -> Result<String> {
        match scheme {
            Scheme::File => fs::read_to_string(self.base.join(resource))
                .map_err(|_| Error::UnresolvedImport(resource.to_string())),
            Scheme::Classpath => Err(Error::UnresolvedImport(resource.to_string())),
        }
    }
}

/// Loads TOML mapping documents, resolving imports through the supplied
/// resolver. The set of in-flight resource names guards against import
/// cycles.
pub struct MappingLoader<R> {
    resolver: R,
}

impl<R: ImportResolver> MappingLoader<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    pub fn load_str(&self, text: &str) -> Result<MappingConfig> {
        let mut active = FxHashSet::default();
        self.parse(text, &mut active)
    }

    pub fn load_resource(&self, resource: &str) -> Result<MappingConfig> {
        let mut active = FxHashSet::default();
        self.load_recursive(resource, &mut active)
    }

    fn load_recursive(
        &self,
        resource: &str,
        active: &mut FxHashSet<String>,
    ) -> Result<MappingConfig> {
        let (scheme, name) = Scheme::split(resource)?;
        if !active.insert(resource.to_string()) {
            return Err(Error::CircularImport(resource.to_string()));
        }
        let text = self.resolver.resolve(scheme, name)?;
        let mapping = self.parse(&text, active)?;
        active.remove(resource);
        Ok(mapping)
    }

    fn parse(&self, text: &str, active: &mut FxHashSet<String>) -> Result<MappingConfig> {
        let mut mapping: MappingConfig =
            toml::from_str(text).map_err(|e| Error::MalformedMapping(e.to_string()))?;

        let imports = std::mem::take(&mut mapping.imports);
        for import in imports {
            let imported = self.load_recursive(&import.resource, active)?;
            mapping.merge(imported);
        }
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxhash::FxHashMap;
    use std::fs;

    struct MapResolver(FxHashMap<&'static str, &'static str>);

    impl ImportResolver for MapResolver {
        fn resolve(&self, _scheme: Scheme, resource: &str) -> Result<String> {
            self.0
                .get(resource)
                .map(|text| text.to_string())
                .ok_or_else(|| Error::UnresolvedImport(resource.to_string()))
        }
    }

    fn resolver(entries: &[(&'static str, &'static str)]) -> MapResolver {
        MapResolver(entries.iter().cloned().collect())
    }

    #[test]
    fn imports_merge() {
        let loader = MappingLoader::new(resolver(&[(
            "common.toml",
            r#"
            [[streams]]
            name = "shared"
            "#,
        )]));

        let mapping = loader
            .load_str(
                r#"
                [[imports]]
                resource = "classpath:common.toml"

                [[streams]]
                name = "local"
                "#,
            )
            .unwrap();

        assert!(mapping.stream("local").is_some());
        assert!(mapping.stream("shared").is_some());
    }

    #[test]
    fn missing_scheme_is_fatal() {
        let loader = MappingLoader::new(resolver(&[]));
        let result = loader.load_str(
            r#"
            [[imports]]
            resource = "common.toml"
            "#,
        );
        assert!(matches!(result, Err(Error::MalformedMapping(_))));
    }

    #[test]
    fn circular_import_detected() {
        let loader = MappingLoader::new(resolver(&[
            (
                "a.toml",
                r#"
                [[imports]]
                resource = "classpath:b.toml"
                "#,
            ),
            (
                "b.toml",
                r#"
                [[imports]]
                resource = "classpath:a.toml"
                "#,
            ),
        ]));

        match loader.load_resource("classpath:a.toml") {
            Err(Error::CircularImport(resource)) => assert_eq!(resource, "classpath:a.toml"),
            other => panic!("expected circular import, got {:?}", other),
        }
    }

    #[test]
    fn self_import_detected() {
        let loader = MappingLoader::new(resolver(&[(
            "a.toml",
            r#"
            [[imports]]
            resource = "classpath:a.toml"
            "#,
        )]));

        assert!(matches!(
            loader.load_resource("classpath:a.toml"),
            Err(Error::CircularImport(_))
        ));
    }

    #[test]
    fn diamond_import_is_not_a_cycle() {
        // a imports b and c; both import d
        let loader = MappingLoader::new(resolver(&[
            (
                "b.toml",
                r#"
                [[imports]]
                resource = "classpath:d.toml"
                "#,
            ),
            (
                "c.toml",
                r#"
                [[imports]]
                resource = "classpath:d.toml"
                "#,
            ),
            (
                "d.toml",
                r#"
                [[streams]]
                name = "leaf"
                "#,
            ),
        ]));

        let mapping = loader
            .load_str(
                r#"
                [[imports]]
                resource = "classpath:b.toml"

                [[imports]]
                resource = "classpath:c.toml"
                "#,
            )
            .unwrap();
        assert_eq!(mapping.streams.len(), 2);
    }

    #[test]
    fn fs_resolver_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.toml"),
            r#"
            [[streams]]
            name = "from-disk"
            "#,
        )
        .unwrap();

        let loader = MappingLoader::new(FsImportResolver::new(dir.path()));
        let mapping = loader.load_resource("file:base.toml").unwrap();
        assert!(mapping.stream("from-disk").is_some());

        assert!(matches!(
            loader.load_resource("file:absent.toml"),
            Err(Error::UnresolvedImport(_))
        ));
    }
}
