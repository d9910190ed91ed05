use std::path::{Path, PathBuf};

pub fn data_dir() -> PathBuf {
    // On macOS and Linux, use ~/.local/share/awr/ (XDG standard)
    // instead of macOS Application Support for consistency
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join("awr")
    }
    #[cfg(windows)]
    {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("awr")
    }
}

pub fn config_dir() -> PathBuf {
    // On macOS and Linux, always use ~/.config/awr/
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("awr")
    }

    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("awr")
    }
}

#[cfg(unix)]
pub fn player_binary_name() -> &'static str {
    "mplayer"
}

#[cfg(windows)]
pub fn player_binary_name() -> &'static str {
    "mplayer.exe"
}

fn find_beside_exe(name: &str) -> Option<PathBuf> {
    let current_exe = std::env::current_exe().ok()?;
    let dir = current_exe.parent()?;
    let p = dir.join(name);
    if p.exists() {
        return Some(p);
    }
    let p = dir.join("external").join(name);
    if p.exists() {
        return Some(p);
    }
    None
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|p| p.exists())
}

/// Resolve the player binary.
///
/// Anything containing a path separator is taken as-is.  Otherwise checks
/// beside the current exe, then PATH.  Falls back to the bare name so the
/// spawn itself reports NotFound.
pub fn find_player_binary(name: &str) -> PathBuf {
    if Path::new(name).components().count() > 1 {
        return PathBuf::from(name);
    }
    find_beside_exe(name)
        .or_else(|| find_on_path(name))
        .unwrap_or_else(|| PathBuf::from(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_is_kept() {
        let p = find_player_binary("/opt/players/mplayer");
        assert_eq!(p, PathBuf::from("/opt/players/mplayer"));
    }

    #[test]
    fn test_unknown_binary_falls_back_to_name() {
        let p = find_player_binary("definitely-not-a-player-binary");
        assert_eq!(p, PathBuf::from("definitely-not-a-player-binary"));
    }

    #[cfg(unix)]
    #[test]
    fn test_dirs_are_namespaced() {
        assert!(config_dir().ends_with(".config/awr"));
        assert!(data_dir().ends_with(".local/share/awr"));
    }
}
