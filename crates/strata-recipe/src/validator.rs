//! Static analysis and validation of the parsed recipe AST.
//!
//! Checks for duplicate names, missing required properties, and path
//! declarations that would escape the build context, before any build
//! work starts.

use std::collections::HashSet;
use std::path::{Component, Path};

use strata_common::error::{Result, StrataError};
use strata_common::types::EntryPoint;

use crate::ast::{RecipeFile, ServiceDecl};

/// Validates a parsed recipe file for semantic correctness.
///
/// # Checks performed
///
/// 1. No duplicate service names.
/// 2. Every service declares `base`, `port`, and `entrypoint`.
/// 3. The port is nonzero and the entry point is well-formed.
/// 4. A declared `workdir` is an absolute path.
/// 5. `manifest` and `source` are relative paths confined to the
///    build context (no `..` components).
///
/// # Errors
///
/// Returns an error if any semantic check fails.
pub fn validate(file: &RecipeFile) -> Result<()> {
    tracing::debug!(services = file.services.len(), "validating recipe file");
    check_duplicate_services(file)?;
    for svc in &file.services {
        check_required_properties(svc)?;
        check_paths(svc)?;
    }
    Ok(())
}

fn check_duplicate_services(file: &RecipeFile) -> Result<()> {
    let mut seen = HashSet::new();
    for svc in &file.services {
        if !seen.insert(&svc.name) {
            return Err(StrataError::Recipe {
                message: format!("duplicate service name: \"{}\"", svc.name),
            });
        }
    }
    Ok(())
}

fn check_required_properties(svc: &ServiceDecl) -> Result<()> {
    let missing = |prop: &str| StrataError::Recipe {
        message: format!("service \"{}\" is missing required property: {prop}", svc.name),
    };

    if svc.base.as_deref().is_none_or(str::is_empty) {
        return Err(missing("base"));
    }
    let Some(port) = svc.port else {
        return Err(missing("port"));
    };
    if port == 0 {
        return Err(StrataError::Recipe {
            message: format!("service \"{}\" declares port 0", svc.name),
        });
    }
    let Some(entrypoint) = svc.entrypoint.as_deref() else {
        return Err(missing("entrypoint"));
    };
    let _ = EntryPoint::parse(entrypoint)?;

    if svc.server.as_deref().is_some_and(str::is_empty) {
        return Err(StrataError::Recipe {
            message: format!("service \"{}\" declares an empty server", svc.name),
        });
    }
    Ok(())
}

fn check_paths(svc: &ServiceDecl) -> Result<()> {
    if let Some(workdir) = svc.workdir.as_deref() {
        if !Path::new(workdir).is_absolute() {
            return Err(StrataError::Recipe {
                message: format!(
                    "service \"{}\": workdir must be absolute, got \"{workdir}\"",
                    svc.name
                ),
            });
        }
    }
    for (prop, value) in [("manifest", &svc.manifest), ("source", &svc.source)] {
        if let Some(raw) = value.as_deref() {
            check_context_relative(&svc.name, prop, raw)?;
        }
    }
    Ok(())
}

/// Rejects paths that are absolute or step outside the build context.
fn check_context_relative(service: &str, prop: &str, raw: &str) -> Result<()> {
    let path = Path::new(raw);
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(StrataError::Recipe {
            message: format!(
                "service \"{service}\": {prop} must stay inside the build context, got \"{raw}\""
            ),
        });
    }
    Ok(())
}
