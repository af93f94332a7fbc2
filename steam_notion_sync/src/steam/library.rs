//! Owned-games list from the Steam Web API

use super::{retry_transient, SteamClient};
use crate::config::RetryPolicy;
use crate::error::{Result, SyncError};
use game_common::{AppId, GameRecord, RecordError};
use serde::Deserialize;

/// Which Steam account to read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRef {
    SteamId(u64),
    Vanity(String),
}

impl UserRef {
    /// Accepts a SteamID64, a vanity name, or a steamcommunity.com
    /// `/profiles/<id>` or `/id/<name>` URL
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim().trim_end_matches('/');
        let tail = input
            .strip_prefix("https://")
            .or_else(|| input.strip_prefix("http://"))
            .map(|rest| rest.trim_start_matches("www."));

        let value = match tail {
            Some(rest) => {
                if let Some(id) = rest.strip_prefix("steamcommunity.com/profiles/") {
                    return id.parse::<u64>().map(UserRef::SteamId).map_err(|_| {
                        SyncError::Config(format!("invalid Steam profile URL: {}", input))
                    });
                }
                let name = rest.strip_prefix("steamcommunity.com/id/").ok_or_else(|| {
                    SyncError::Config(format!("unsupported Steam profile URL: {}", input))
                })?;
                urlencoding::decode(name)
                    .map_err(|_| SyncError::Config(format!("invalid Steam profile URL: {}", input)))?
            }
            None => std::borrow::Cow::Borrowed(input),
        };

        if value.is_empty() {
            return Err(SyncError::Config("STEAM_USER is empty".to_string()));
        }
        if value.len() == 17 && value.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = value.parse::<u64>() {
                return Ok(UserRef::SteamId(id));
            }
        }
        Ok(UserRef::Vanity(value.to_string()))
    }
}

/// One entry of the owned-games response
#[derive(Debug, Clone, Deserialize)]
pub struct OwnedGame {
    pub appid: AppId,
    #[serde(default)]
    pub name: String,
    /// Minutes
    #[serde(default)]
    pub playtime_forever: u32,
    #[serde(default)]
    pub img_icon_url: Option<String>,
    #[serde(default)]
    pub img_logo_url: Option<String>,
}

impl OwnedGame {
    /// Library-only record: name, playtime and community images
    pub fn to_record(&self, client: &SteamClient) -> std::result::Result<GameRecord, RecordError> {
        let mut record = GameRecord::new(self.appid, &self.name)?;
        record.playtime_minutes = self.playtime_forever;
        record.icon_uri = image(client, self.appid, self.img_icon_url.as_deref());
        record.logo_uri = image(client, self.appid, self.img_logo_url.as_deref());
        Ok(record)
    }
}

fn image(client: &SteamClient, app_id: AppId, hash: Option<&str>) -> Option<String> {
    hash.filter(|h| !h.is_empty())
        .map(|h| client.image_url(app_id, h))
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    response: T,
}

#[derive(Debug, Deserialize)]
struct OwnedGamesBody {
    game_count: Option<u32>,
    #[serde(default)]
    games: Vec<OwnedGame>,
}

#[derive(Debug, Deserialize)]
struct VanityBody {
    success: u8,
    steamid: Option<String>,
}

impl SteamClient {
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let response = self
            .http
            .get(url)
            .query(&[("key", self.api_key.as_str())])
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatus(status));
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Resolve a user reference to a SteamID64
    pub async fn resolve_user(&self, user: &UserRef) -> Result<u64> {
        let vanity = match user {
            UserRef::SteamId(id) => return Ok(*id),
            UserRef::Vanity(name) => name,
        };

        let url = format!("{}/ISteamUser/ResolveVanityURL/v1/", self.api_url);
        let body: ApiResponse<VanityBody> = self
            .get_json(&url, &[("vanityurl", vanity.as_str())])
            .await?;

        match (body.response.success, body.response.steamid) {
            (1, Some(id)) => id
                .parse::<u64>()
                .map_err(|_| SyncError::UserNotFound(vanity.clone())),
            _ => Err(SyncError::UserNotFound(vanity.clone())),
        }
    }

    /// Owned games of a SteamID64, in the order the API returns them
    pub async fn owned_games(&self, steam_id: u64, include_free: bool) -> Result<Vec<OwnedGame>> {
        let url = format!("{}/IPlayerService/GetOwnedGames/v1/", self.api_url);
        let steam_id_param = steam_id.to_string();
        let body: ApiResponse<OwnedGamesBody> = self
            .get_json(
                &url,
                &[
                    ("steamid", steam_id_param.as_str()),
                    ("include_appinfo", "1"),
                    ("include_played_free_games", if include_free { "1" } else { "0" }),
                    ("format", "json"),
                ],
            )
            .await?;

        // Private profiles answer with an empty response object
        if body.response.game_count.is_none() {
            return Err(SyncError::PrivateProfile(steam_id_param));
        }
        Ok(body.response.games)
    }

    /// Resolve `user` and fetch its library, retrying transient failures
    pub async fn fetch_library(
        &self,
        user: &UserRef,
        include_free: bool,
        retry: &RetryPolicy,
    ) -> Result<Vec<OwnedGame>> {
        let steam_id = retry_transient(retry, "Resolving Steam user", || self.resolve_user(user)).await?;
        log::info!("Fetching owned games of Steam user {}", steam_id);

        let games = retry_transient(retry, "Fetching Steam library", || {
            self.owned_games(steam_id, include_free)
        })
        .await?;
        log::info!("Fetched {} games from the Steam library", games.len());
        Ok(games)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Endpoints;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> SteamClient {
        let endpoints = Endpoints {
            steam_api: server.uri(),
            ..Endpoints::default()
        };
        SteamClient::new("key", &endpoints).unwrap()
    }

    #[test]
    fn test_parse_user_refs() {
        assert_eq!(
            UserRef::parse("76561197960287930").unwrap(),
            UserRef::SteamId(76561197960287930)
        );
        assert_eq!(
            UserRef::parse("https://steamcommunity.com/profiles/76561197960287930/").unwrap(),
            UserRef::SteamId(76561197960287930)
        );
        assert_eq!(
            UserRef::parse("https://steamcommunity.com/id/gabelogannewell").unwrap(),
            UserRef::Vanity("gabelogannewell".into())
        );
        assert_eq!(
            UserRef::parse(" gabelogannewell ").unwrap(),
            UserRef::Vanity("gabelogannewell".into())
        );
        // Short numeric names are vanity names, not ids
        assert_eq!(UserRef::parse("12345").unwrap(), UserRef::Vanity("12345".into()));
        assert_eq!(
            UserRef::parse("https://steamcommunity.com/id/j%C3%BCrgen").unwrap(),
            UserRef::Vanity("jürgen".into())
        );
        assert!(UserRef::parse("https://example.com/someone").is_err());
        assert!(UserRef::parse("").is_err());
    }

    #[test]
    fn test_owned_game_to_record() {
        let client = SteamClient::new("key", &Endpoints::default()).unwrap();
        let game: OwnedGame = serde_json::from_value(json!({
            "appid": 620,
            "name": "Portal 2",
            "playtime_forever": 600,
            "img_icon_url": "icon",
            "img_logo_url": ""
        }))
        .unwrap();

        let record = game.to_record(&client).unwrap();
        assert_eq!(record.name(), "Portal 2");
        assert_eq!(record.playtime_hours(), 10.0);
        assert!(record.icon_uri.as_deref().unwrap().ends_with("/apps/620/icon.jpg"));
        assert!(record.logo_uri.is_none());
    }

    #[tokio::test]
    async fn test_resolve_vanity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ISteamUser/ResolveVanityURL/v1/"))
            .and(query_param("vanityurl", "someone"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": { "steamid": "76561197960287930", "success": 1 }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ISteamUser/ResolveVanityURL/v1/"))
            .and(query_param("vanityurl", "nobody"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": { "success": 42, "message": "No match" }
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        assert_eq!(
            client
                .resolve_user(&UserRef::Vanity("someone".into()))
                .await
                .unwrap(),
            76561197960287930
        );
        assert!(matches!(
            client.resolve_user(&UserRef::Vanity("nobody".into())).await,
            Err(SyncError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_owned_games_keeps_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/IPlayerService/GetOwnedGames/v1/"))
            .and(query_param("steamid", "76561197960287930"))
            .and(query_param("include_played_free_games", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {
                    "game_count": 2,
                    "games": [
                        { "appid": 620, "name": "Portal 2", "playtime_forever": 600 },
                        { "appid": 400, "name": "Portal", "playtime_forever": 0 }
                    ]
                }
            })))
            .mount(&server)
            .await;

        let games = client(&server)
            .owned_games(76561197960287930, false)
            .await
            .unwrap();
        let ids: Vec<_> = games.iter().map(|g| g.appid).collect();
        assert_eq!(ids, vec![620, 400]);
    }

    #[tokio::test]
    async fn test_private_profile_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/IPlayerService/GetOwnedGames/v1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": {} })))
            .mount(&server)
            .await;

        let err = client(&server)
            .fetch_library(
                &UserRef::SteamId(76561197960287930),
                true,
                &RetryPolicy::immediate(3),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::PrivateProfile(_)));
    }

    #[tokio::test]
    async fn test_library_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/IPlayerService/GetOwnedGames/v1/"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/IPlayerService/GetOwnedGames/v1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": { "game_count": 1, "games": [{ "appid": 620, "name": "Portal 2" }] }
            })))
            .mount(&server)
            .await;

        let games = client(&server)
            .fetch_library(
                &UserRef::SteamId(76561197960287930),
                true,
                &RetryPolicy::immediate(3),
            )
            .await
            .unwrap();
        assert_eq!(games.len(), 1);
    }
}
