use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::PackageError;

/// Kind of distribution a file represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Sdist,
    BdistDumb,
    BdistRpm,
    BdistWininst,
    BdistEgg,
    BdistDmg,
}

impl FileType {
    pub const ALL: [FileType; 6] = [
        FileType::Sdist,
        FileType::BdistDumb,
        FileType::BdistRpm,
        FileType::BdistWininst,
        FileType::BdistEgg,
        FileType::BdistDmg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Sdist => "sdist",
            FileType::BdistDumb => "bdist_dumb",
            FileType::BdistRpm => "bdist_rpm",
            FileType::BdistWininst => "bdist_wininst",
            FileType::BdistEgg => "bdist_egg",
            FileType::BdistDmg => "bdist_dmg",
        }
    }

    /// Guesses the file type from a filename.
    ///
    /// Eggs are binary distributions, everything else is treated as a source distribution.
    pub fn from_filename(filename: &str) -> Self {
        if filename.to_ascii_lowercase().ends_with(".egg") {
            FileType::BdistEgg
        } else {
            FileType::Sdist
        }
    }
}

impl FromStr for FileType {
    type Err = PackageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileType::ALL
            .into_iter()
            .find(|filetype| filetype.as_str() == s.trim())
            .ok_or_else(|| PackageError::UnknownFileType(s.to_string()))
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_filename() {
        assert_eq!(FileType::from_filename("foo-1.0.tar.gz"), FileType::Sdist);
        assert_eq!(FileType::from_filename("foo-1.0.zip"), FileType::Sdist);
        assert_eq!(FileType::from_filename("foo-1.0-py2.7.egg"), FileType::BdistEgg);
        assert_eq!(
            FileType::from_filename("foo-1.0-py3-none-any.whl"),
            FileType::Sdist
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!("bdist_rpm".parse::<FileType>().unwrap(), FileType::BdistRpm);
        assert_eq!(" sdist ".parse::<FileType>().unwrap(), FileType::Sdist);
        assert!(matches!(
            "bdist_wheel".parse::<FileType>(),
            Err(PackageError::UnknownFileType(_))
        ));
    }

    #[test]
    fn test_display_round_trips_all() {
        for filetype in FileType::ALL {
            assert_eq!(filetype.to_string().parse::<FileType>().unwrap(), filetype);
        }
    }
}
