use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use crate::models::{
    AccountPlaylists, AccountProfile, Discovered, DiscoveredAlbum, DiscoveredPlaylist,
    GeneratedPlaylist, ItemKind, PlaylistDraft, RecommendationRequest, SearchQuery,
};
use crate::names::NameGenerator;
use crate::spotify::Catalog;
use crate::token::TokenCache;
use crate::user_auth::UserTokenStore;
use crate::{Error, Result, LOG};

/// Spotify's largest search page
pub const PAGE_SIZE: u32 = 50;
/// Random offsets are drawn from `0..MAX_OFFSET`
pub const MAX_OFFSET: u32 = 1000;
pub const RECOMMENDATION_LIMIT: u32 = 20;
pub const PLAYLIST_NAME_PREFIX: &str = "Wholeschool Playlist";
const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const MAX_PLAYLIST_PAGES: usize = 20;

/// The keyword as-is, or when empty a single random letter with
/// spotify's `%` wildcard after it or on both sides.
pub fn search_term<R: Rng + ?Sized>(keyword: &str, rng: &mut R) -> String {
    if !keyword.is_empty() {
        return keyword.to_string();
    }
    let letter = LETTERS[rng.random_range(0..LETTERS.len())] as char;
    if rng.random_bool(0.5) {
        format!("{}%", letter)
    } else {
        format!("%{}%", letter)
    }
}

pub fn search_query<R: Rng + ?Sized>(keyword: &str, kind: ItemKind, rng: &mut R) -> SearchQuery {
    SearchQuery {
        term: search_term(keyword, rng),
        kind,
        limit: PAGE_SIZE,
        offset: rng.random_range(0..MAX_OFFSET),
    }
}

pub fn recommendation_request<R: Rng + ?Sized>(keyword: &str, rng: &mut R) -> RecommendationRequest {
    let seed_genres = if keyword.trim().is_empty() {
        None
    } else {
        Some(vec![keyword.to_string()])
    };
    RecommendationRequest {
        seed_genres,
        target_popularity: if rng.random_bool(0.5) { 80 } else { 100 },
        market: if rng.random_bool(0.5) { "GB" } else { "US" },
        limit: RECOMMENDATION_LIMIT,
    }
}

pub fn playlist_draft(owner: &str, name_suffix: &str, keyword: &str, date: NaiveDate) -> PlaylistDraft {
    let date = date.format("%d/%m/%Y");
    let description = if keyword.trim().is_empty() {
        format!("Auto generated playlist on {}", date)
    } else {
        format!("Auto generated playlist for {} on {}", keyword, date)
    };
    PlaylistDraft {
        owner: owner.to_string(),
        name: format!("{} {}", PLAYLIST_NAME_PREFIX, name_suffix),
        public: true,
        collaborative: false,
        description,
    }
}

pub struct Discovery {
    catalog: Arc<dyn Catalog>,
    tokens: Arc<TokenCache>,
    users: Arc<UserTokenStore>,
    names: Arc<dyn NameGenerator>,
    account_id: String,
    rng: Mutex<StdRng>,
}

impl Discovery {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        tokens: Arc<TokenCache>,
        users: Arc<UserTokenStore>,
        names: Arc<dyn NameGenerator>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            tokens,
            users,
            names,
            account_id: account_id.into(),
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    #[cfg(test)]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    // never held across an await
    fn random<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }

    /// Pick a random playlist or album, matching `keyword` or a random
    /// wildcard search when `keyword` is empty.
    pub async fn random_discovery(&self, keyword: &str, kind: ItemKind) -> Result<Discovered> {
        let token = self.tokens.access_token().await?;
        let query = self.random(|rng| search_query(keyword, kind, rng));
        slog::info!(
            LOG, "random discovery";
            "kind" => kind.as_str(),
            "term" => &query.term,
            "offset" => query.offset,
        );
        let resp = self.catalog.search(&token, &query).await?;
        let not_found = || {
            Error::NotFound(format!(
                "no {} results for {:?} at offset {}",
                kind.as_str(),
                query.term,
                query.offset
            ))
        };
        match kind {
            ItemKind::Playlist => {
                let items = resp.playlists.map(|p| p.into_items()).unwrap_or_default();
                let item = self
                    .random(|rng| items.choose(rng).cloned())
                    .ok_or_else(not_found)?;
                Ok(Discovered::Playlist(DiscoveredPlaylist::from(item)))
            }
            ItemKind::Album => {
                let items = resp.albums.map(|p| p.into_items()).unwrap_or_default();
                let item = self
                    .random(|rng| items.choose(rng).cloned())
                    .ok_or_else(not_found)?;
                Ok(Discovered::Album(DiscoveredAlbum::from(item)))
            }
        }
    }

    /// Create a playlist of recommendations under the configured account.
    /// A playlist whose tracks could not be set is reported as
    /// `Error::PartialPlaylist`, it is left in place on spotify.
    pub async fn generate_playlist(&self, keyword: &str) -> Result<GeneratedPlaylist> {
        let token = self.users.user_token().await?;
        let request = self.random(|rng| recommendation_request(keyword, rng));
        let tracks = self.catalog.recommendations(&token, &request).await?;
        if tracks.is_empty() {
            return Err(Error::NotFound(format!(
                "no recommendations for {:?} in market {}",
                keyword, request.market
            )));
        }

        let draft = playlist_draft(
            &self.account_id,
            &self.names.generate(),
            keyword,
            chrono::Local::now().date_naive(),
        );
        let playlist = self.catalog.create_playlist(&token, &draft).await?;
        let uris = tracks.into_iter().map(|t| t.uri).collect::<Vec<_>>();
        let generated = GeneratedPlaylist::new(playlist, uris.len());
        slog::info!(
            LOG, "created playlist";
            "id" => &generated.id,
            "name" => &generated.name,
            "tracks" => uris.len(),
        );

        match self
            .catalog
            .replace_playlist_tracks(&token, &generated.id, &uris)
            .await
        {
            Ok(()) => {
                slog::info!(LOG, "populated playlist"; "id" => &generated.id);
                Ok(generated)
            }
            Err(e) => {
                slog::error!(
                    LOG, "failed populating playlist";
                    "id" => &generated.id,
                    "error" => e.to_string(),
                );
                Err(Error::PartialPlaylist {
                    playlist: generated,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Profile and every playlist of the authorized account
    pub async fn account_playlists(&self) -> Result<AccountPlaylists> {
        let token = self.users.user_token().await?;
        let profile = self.catalog.current_user(&token).await?;

        let mut playlists = vec![];
        let mut next: Option<String> = None;
        for _ in 0..MAX_PLAYLIST_PAGES {
            let page = self.catalog.playlists_page(&token, next.as_deref()).await?;
            next = page.next.clone();
            playlists.extend(page.into_items().into_iter().map(DiscoveredPlaylist::from));
            if next.is_none() {
                break;
            }
        }
        if next.is_some() {
            slog::warn!(
                LOG, "stopped following playlist pages";
                "pages" => MAX_PLAYLIST_PAGES,
                "playlists" => playlists.len(),
            );
        }

        Ok(AccountPlaylists {
            profile: AccountProfile {
                id: profile.id,
                display_name: profile.display_name,
            },
            count: playlists.len(),
            playlists,
        })
    }
}
