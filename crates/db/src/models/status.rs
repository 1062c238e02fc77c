//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding lookup table.

use serde::Serialize;

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Map a database ID back to the enum, if it is known.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// The `name` column of the lookup row.
            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )+
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

define_status_enum! {
    /// Scene generation status (`scene_statuses`).
    SceneStatus {
        Pending = 1 => "pending",
        Generating = 2 => "generating",
        ImageComplete = 3 => "image_complete",
        Complete = 4 => "complete",
        Failed = 5 => "failed",
    }
}

define_status_enum! {
    /// Generated asset status (`asset_statuses`).
    AssetStatus {
        Pending = 1 => "pending",
        Complete = 2 => "complete",
        Failed = 3 => "failed",
    }
}

define_status_enum! {
    /// Generated asset kind (`asset_types`).
    AssetType {
        Image = 1 => "image",
        Video = 2 => "video",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for status in [
            SceneStatus::Pending,
            SceneStatus::Generating,
            SceneStatus::ImageComplete,
            SceneStatus::Complete,
            SceneStatus::Failed,
        ] {
            assert_eq!(SceneStatus::from_id(status.id()), Some(status));
        }
    }

    #[test]
    fn unknown_id_is_none() {
        assert_eq!(AssetStatus::from_id(0), None);
        assert_eq!(AssetType::from_id(9), None);
    }

    #[test]
    fn names_match_seed_data() {
        assert_eq!(SceneStatus::ImageComplete.name(), "image_complete");
        assert_eq!(AssetType::Video.to_string(), "video");
        assert_eq!(
            serde_json::to_string(&SceneStatus::ImageComplete).unwrap(),
            "\"image_complete\""
        );
    }
}
