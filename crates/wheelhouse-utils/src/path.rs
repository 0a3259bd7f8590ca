use std::{
    env,
    path::{Component, Path, PathBuf},
};

use crate::error::{PathError, PathResult};

/// Resolves a configured path.
///
/// `$VAR` and `${VAR}` references are expanded from the environment, a leading `~` becomes the
/// home directory and relative paths are anchored at the current working directory.
///
/// # Errors
///
/// * [`PathError::Empty`] if the path is empty
/// * [`PathError::CurrentDir`] if the current directory cannot be determined
/// * [`PathError::MissingEnvVar`] if a referenced variable is undefined
/// * [`PathError::UnclosedVariable`] if a `${` has no closing brace
///
/// # Example
///
/// ```
/// use wheelhouse_utils::path::resolve_path;
///
/// let storage = resolve_path("$HOME/wheelhouse/storage").unwrap();
/// assert!(storage.is_absolute());
/// ```
pub fn resolve_path(path: &str) -> PathResult<PathBuf> {
    let path = path.trim();
    if path.is_empty() {
        return Err(PathError::Empty);
    }

    let expanded = PathBuf::from(expand_vars(path)?);
    if expanded.is_absolute() {
        return Ok(expanded);
    }

    env::current_dir()
        .map(|cwd| cwd.join(expanded))
        .map_err(|source| PathError::CurrentDir { source })
}

fn expand_vars(input: &str) -> PathResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    if let Some(tail) = rest.strip_prefix('~') {
        if tail.is_empty() || tail.starts_with('/') {
            out.push_str(&home_dir().to_string_lossy());
            rest = tail;
        }
    }

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, remainder) = if let Some(braced) = after.strip_prefix('{') {
            let end = braced.find('}').ok_or_else(|| {
                PathError::UnclosedVariable {
                    input: rest[pos..].to_string(),
                }
            })?;
            (&braced[..end], &braced[end + 1..])
        } else {
            let end = after
                .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], &after[end..])
        };

        if name.is_empty() {
            out.push('$');
        } else {
            out.push_str(&lookup_var(name, input)?);
        }
        rest = remainder;
    }

    out.push_str(rest);
    Ok(out)
}

fn lookup_var(name: &str, input: &str) -> PathResult<String> {
    let value = match name {
        "HOME" => home_dir(),
        "XDG_CONFIG_HOME" => xdg_config_home(),
        "XDG_DATA_HOME" => xdg_data_home(),
        _ => {
            return env::var(name).map_err(|_| {
                PathError::MissingEnvVar {
                    var: name.to_string(),
                    input: input.to_string(),
                }
            })
        }
    };
    Ok(value.to_string_lossy().into_owned())
}

/// Home directory from `HOME`, else `/home/$USER`, else `/`.
pub fn home_dir() -> PathBuf {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USER").map(|user| Path::new("/home").join(user)))
        .unwrap_or_else(|| PathBuf::from("/"))
}

pub fn xdg_config_home() -> PathBuf {
    env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(".config"))
}

pub fn xdg_data_home() -> PathBuf {
    env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(".local/share"))
}

/// Checks that `name` is a single, plain path component.
///
/// Artifact filenames arrive from clients and are joined onto the storage root, so anything
/// containing a separator, a parent reference or a leading dot is refused.
///
/// # Errors
///
/// * [`PathError::Empty`] if the name is empty
/// * [`PathError::UnsafeFilename`] if the name is not a single normal component
pub fn plain_filename(name: &str) -> PathResult<&str> {
    if name.is_empty() {
        return Err(PathError::Empty);
    }

    let mut components = Path::new(name).components();
    let is_plain = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0']);

    if is_plain {
        Ok(name)
    } else {
        Err(PathError::UnsafeFilename {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn with_env<F: FnOnce()>(vars: &[(&str, Option<&str>)], f: F) {
        let _guard = ENV_MUTEX.lock().unwrap();
        for (key, value) in vars {
            match value {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
        f()
    }

    #[test]
    fn test_expand_plain_and_braced() {
        with_env(&[("WHEELHOUSE_TEST_VAR", Some("test_value"))], || {
            assert_eq!(
                expand_vars("$WHEELHOUSE_TEST_VAR/path").unwrap(),
                "test_value/path"
            );
            assert_eq!(
                expand_vars("${WHEELHOUSE_TEST_VAR}.d/path").unwrap(),
                "test_value.d/path"
            );
            assert_eq!(expand_vars("cost$/x").unwrap(), "cost$/x");
        });
    }

    #[test]
    fn test_expand_errors() {
        with_env(&[("WHEELHOUSE_TEST_MISSING", None)], || {
            assert!(matches!(
                expand_vars("${WHEELHOUSE_TEST_VAR"),
                Err(PathError::UnclosedVariable { .. })
            ));
            assert!(matches!(
                expand_vars("$WHEELHOUSE_TEST_MISSING/x"),
                Err(PathError::MissingEnvVar { var, .. }) if var == "WHEELHOUSE_TEST_MISSING"
            ));
        });
    }

    #[test]
    fn test_xdg_directories() {
        with_env(
            &[
                ("HOME", Some("/tmp/home")),
                ("XDG_CONFIG_HOME", None),
                ("XDG_DATA_HOME", None),
            ],
            || {
                assert_eq!(home_dir(), PathBuf::from("/tmp/home"));
                assert_eq!(xdg_config_home(), PathBuf::from("/tmp/home/.config"));
                assert_eq!(xdg_data_home(), PathBuf::from("/tmp/home/.local/share"));

                env::set_var("XDG_DATA_HOME", "/tmp/data");
                assert_eq!(xdg_data_home(), PathBuf::from("/tmp/data"));
                env::remove_var("XDG_DATA_HOME");
            },
        );
    }

    #[test]
    fn test_resolve_path() {
        with_env(&[("HOME", Some("/tmp/home"))], || {
            assert!(matches!(resolve_path("  "), Err(PathError::Empty)));
            assert_eq!(
                resolve_path("/srv/wheelhouse").unwrap(),
                PathBuf::from("/srv/wheelhouse")
            );
            assert_eq!(
                resolve_path("~/wheelhouse").unwrap(),
                PathBuf::from("/tmp/home/wheelhouse")
            );
            assert_eq!(
                resolve_path("$HOME/db").unwrap(),
                PathBuf::from("/tmp/home/db")
            );

            let relative = resolve_path("relative/path").unwrap();
            assert!(relative.is_absolute());
            assert!(relative.ends_with("relative/path"));
        });
    }

    #[test]
    fn test_plain_filename() {
        assert_eq!(
            plain_filename("demo-1.0.tar.gz").unwrap(),
            "demo-1.0.tar.gz"
        );
        assert!(matches!(plain_filename(""), Err(PathError::Empty)));
        for name in ["../demo.tar.gz", "a/b.zip", "..", ".", ".hidden", "/etc/passwd", "a\\b"] {
            assert!(
                matches!(plain_filename(name), Err(PathError::UnsafeFilename { .. })),
                "{name} should be rejected"
            );
        }
    }
}
