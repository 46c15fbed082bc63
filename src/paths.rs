use std::{path::PathBuf, sync::LazyLock};

/// Environment variable that relocates the whole application-data directory.
pub const HOME_OVERRIDE_VAR: &str = "EARTH_LAUNCHER_HOME";

pub static DEFAULT_EARTH_PATH: LazyLock<PathBuf> = LazyLock::new(|| {
    if let Some(custom) = std::env::var_os(HOME_OVERRIDE_VAR) {
        if !custom.is_empty() {
            return PathBuf::from(custom);
        }
    }

    let mut path = dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_default();
    path.push("earth-launcher");
    path
});

/// Computes a path inside the launcher's application-data directory.
///
/// Returns a `&Path` referencing the data directory itself if no arguments are passed in, or a
/// `PathBuf` created by joining all of the arguments to the base directory if at least
/// one argument is passed in.
///
/// # Examples
///
/// ```
/// use earth_launcher::earth_path;
///
/// let base = earth_path!().to_path_buf();
/// assert_eq!(earth_path!("games", "Foo"), base.join("games").join("Foo"));
/// ```
#[macro_export]
macro_rules! earth_path {
    () => {
        $crate::paths::DEFAULT_EARTH_PATH.as_path()
    };

    ( $( $path:expr ),+ $(,)? ) => {
        [
            $crate::paths::DEFAULT_EARTH_PATH.as_path(),
            $( std::path::Path::new(&$path) ),+
        ].into_iter().collect::<std::path::PathBuf>()
    };
}
