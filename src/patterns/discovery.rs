//! Spring Boot service discovery.

use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::PipelineError;

/// A service directory: an immediate child of the project root holding
/// `src/main/java` with an `*Application.java` somewhere below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDir {
    pub name: String,
    pub path: PathBuf,
}

fn is_application_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with("Application.java"))
        .unwrap_or(false)
}

/// First `*Application.java` under `dir`, in file-name order.
pub fn find_application(dir: &Path) -> Option<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && is_application_file(e.path()))
        .map(|e| e.into_path())
}

/// Service directories under `root`, sorted by name.
pub fn find_services(root: &Path) -> Result<Vec<ServiceDir>, PipelineError> {
    let mut services = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if !path.is_dir() || !path.join("src/main/java").is_dir() {
            continue;
        }
        if find_application(&path).is_none() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            services.push(ServiceDir {
                name: name.to_string(),
                path: path.clone(),
            });
        }
    }
    services.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(services)
}

/// Java package of an application file: the directories between the first
/// `java` component and the file itself, joined with dots.
pub fn pkg_from_application(app_java: &Path) -> Option<String> {
    let parts: Vec<&str> = app_java
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();
    let java = parts.iter().position(|p| *p == "java")?;
    let dirs = parts.get(java + 1..parts.len().saturating_sub(1))?;
    Some(dirs.join("."))
}

pub fn detect_package(service_dir: &Path) -> Option<String> {
    // Only look below src/main/java so a `java` directory higher up in the
    // absolute path is never taken as the source root.
    let java_root = service_dir.join("src/main/java");
    let app = find_application(&java_root)?;
    let rel = app.strip_prefix(service_dir.join("src/main")).ok()?;
    pkg_from_application(rel)
}

/// `order-service` → `Order`, `user_profile-service` → `UserProfile`.
pub fn infer_service_name(folder_name: &str) -> String {
    let base = folder_name.strip_suffix("-service").unwrap_or(folder_name);
    base.split(|c: char| c == '-' || c == '_' || c == ' ')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "class X {}").unwrap();
    }

    #[test]
    fn test_find_services_requires_application_class() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "order-service/src/main/java/com/shop/order/OrderApplication.java");
        touch(temp.path(), "auth-service/src/main/java/com/shop/auth/AuthApplication.java");
        touch(temp.path(), "lib/src/main/java/com/shop/Util.java");
        touch(temp.path(), "frontend/package.json");

        let names: Vec<_> = find_services(temp.path())
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["auth-service", "order-service"]);
    }

    #[test]
    fn test_detect_package() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "order-service/src/main/java/com/shop/order/OrderApplication.java");
        assert_eq!(
            detect_package(&temp.path().join("order-service")).as_deref(),
            Some("com.shop.order")
        );

        touch(temp.path(), "flat-service/src/main/java/FlatApplication.java");
        assert_eq!(detect_package(&temp.path().join("flat-service")).as_deref(), Some(""));
    }

    #[test]
    fn test_pkg_from_application_path() {
        let pkg = pkg_from_application(Path::new("svc/src/main/java/com/acme/App.java"));
        assert_eq!(pkg.as_deref(), Some("com.acme"));
        assert_eq!(pkg_from_application(Path::new("svc/App.java")), None);
    }

    #[test]
    fn test_infer_service_name() {
        assert_eq!(infer_service_name("order-service"), "Order");
        assert_eq!(infer_service_name("user_profile-service"), "UserProfile");
        assert_eq!(infer_service_name("PAYMENT"), "Payment");
        assert_eq!(infer_service_name("--"), "");
    }
}
