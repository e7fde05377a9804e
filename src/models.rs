use crate::spotify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Playlist,
    Album,
}

impl ItemKind {
    /// The `type` value spotify's search endpoint expects
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Playlist => "playlist",
            ItemKind::Album => "album",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub term: String,
    pub kind: ItemKind,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationRequest {
    // `None` lets spotify pick, we never send an empty seed list
    pub seed_genres: Option<Vec<String>>,
    pub target_popularity: u8,
    pub market: &'static str,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistDraft {
    pub owner: String,
    pub name: String,
    pub public: bool,
    pub collaborative: bool,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredPlaylist {
    pub name: String,
    pub uri: String,
    pub track_count: u32,
    pub href: String,
    pub link: Option<String>,
    pub id: String,
}

impl From<spotify::SimplePlaylist> for DiscoveredPlaylist {
    fn from(p: spotify::SimplePlaylist) -> Self {
        Self {
            track_count: p.track_count(),
            link: p.external_urls.spotify,
            name: p.name,
            uri: p.uri,
            href: p.href,
            id: p.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredAlbum {
    pub name: String,
    pub uri: String,
    pub artist: String,
    pub href: String,
    pub link: Option<String>,
    pub id: String,
}

impl From<spotify::SimpleAlbum> for DiscoveredAlbum {
    fn from(a: spotify::SimpleAlbum) -> Self {
        Self {
            artist: a
                .artists
                .iter()
                .map(|artist| artist.name.as_str())
                .collect::<Vec<_>>()
                .join(","),
            link: a.external_urls.spotify,
            name: a.name,
            uri: a.uri,
            href: a.href,
            id: a.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Discovered {
    Playlist(DiscoveredPlaylist),
    Album(DiscoveredAlbum),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPlaylist {
    pub name: String,
    pub uri: String,
    pub href: String,
    pub link: Option<String>,
    pub id: String,
    pub track_count: usize,
}

impl GeneratedPlaylist {
    pub fn new(playlist: spotify::Playlist, track_count: usize) -> Self {
        Self {
            name: playlist.name,
            uri: playlist.uri,
            href: playlist.href,
            link: playlist.external_urls.spotify,
            id: playlist.id,
            track_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AccountPlaylists {
    pub profile: AccountProfile,
    pub count: usize,
    pub playlists: Vec<DiscoveredPlaylist>,
}
