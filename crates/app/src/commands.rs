//! Command handlers.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use cm_application::{
    ApiError, HttpClientError, KeyValueStorage, LanguageError, LanguageStore, RequestPipeline,
    RouteGuard, Session, SessionError, StorageError,
};
use cm_domain::{
    ApiRequest, HttpMethod, LogoutReason, Navigation, Registration, SessionEvent, token_preview,
};
use cm_infrastructure::{ClientConfig, JsonFileStorage, MemoryStorage, ReqwestHttpClient};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::routes;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("http client: {0}")]
    Http(#[from] HttpClientError),
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("{0}")]
    Language(#[from] LanguageError),
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("invalid query parameter {0:?}; expected key=value")]
    InvalidQuery(String),
    #[error("not logged in")]
    NotLoggedIn,
    #[error("could not read password: {0}")]
    Io(#[from] io::Error),
}

/// Everything a command needs, wired once per process.
pub struct App {
    session: Arc<Session>,
    pipeline: RequestPipeline,
    guard: RouteGuard,
    language: Arc<LanguageStore>,
}

impl App {
    pub fn build(config: &ClientConfig, ephemeral: bool) -> Result<Self, CliError> {
        let storage: Arc<dyn KeyValueStorage> = if ephemeral {
            Arc::new(MemoryStorage::new())
        } else {
            Arc::new(JsonFileStorage::open(config.storage_path())?)
        };
        let language = Arc::new(LanguageStore::load(Arc::clone(&storage)));
        let http = Arc::new(ReqwestHttpClient::new(config)?);
        let session = Arc::new(Session::new(http, storage, language.clone()));

        Ok(Self {
            pipeline: RequestPipeline::new(Arc::clone(&session)),
            guard: RouteGuard::new(Arc::clone(&session)),
            session,
            language,
        })
    }

    pub async fn login(&self, username: &str, password: Option<String>) -> Result<(), CliError> {
        let password = match password {
            Some(password) => password,
            None => prompt("Password: ")?,
        };
        let user = self.session.login(username, &password).await?;
        println!("Logged in as {}", user.display_name());
        Ok(())
    }

    pub fn logout(&self) {
        self.session.logout();
        println!("Logged out");
    }

    pub async fn whoami(&self) -> Result<(), CliError> {
        self.session.initialize().await;
        let user = self.session.current_user().ok_or(CliError::NotLoggedIn)?;
        println!("{}", serde_json::to_string_pretty(&user)?);
        Ok(())
    }

    pub async fn status(&self) {
        self.session.initialize().await;
        let pair = self.session.credentials().get();
        let preview = |token: Option<&str>| token.map_or_else(|| "-".to_string(), token_preview);

        println!("state:         {}", self.session.state());
        println!("logged in:     {}", self.session.is_logged_in());
        if let Some(user) = self.session.current_user() {
            println!("user:          {} ({})", user.username, user.display_name());
        }
        println!("access token:  {}", preview(pair.access_token.as_deref()));
        println!("refresh token: {}", preview(pair.refresh_token.as_deref()));
        println!("language:      {}", self.language.selected());
    }

    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        data: Option<&str>,
        query: &[String],
        page: &str,
    ) -> Result<(), CliError> {
        self.session.initialize().await;

        let mut request = ApiRequest::new(method, path);
        if let Some(data) = data {
            if !method.has_body() {
                tracing::warn!(%method, "sending a body with a method that usually has none");
            }
            request = request.with_body(serde_json::from_str(data)?);
        }
        for pair in query {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| CliError::InvalidQuery(pair.clone()))?;
            request = request.with_query(key, value);
        }

        let mut events = self.session.subscribe();
        match self.pipeline.send(request).await {
            Ok(response) => {
                eprintln!("HTTP {} ({} ms)", response.status, response.duration.as_millis());
                match response.json::<serde_json::Value>() {
                    Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
                    Err(_) => println!("{}", response.text()),
                }
                Ok(())
            }
            Err(e) => {
                if e.session_ended()
                    && let Some(reason) = logout_reason(&mut events)
                    && let Some(navigation) = self.guard.after_logout(&routes::resolve(page), reason)
                {
                    print_navigation(&navigation);
                }
                Err(e.into())
            }
        }
    }

    pub async fn register(
        &self,
        username: String,
        email: String,
        password: Option<String>,
        first_name: String,
        last_name: String,
    ) -> Result<(), CliError> {
        let password = match password {
            Some(password) => password,
            None => prompt("Password: ")?,
        };
        let registration = Registration {
            username,
            email,
            password,
            first_name,
            last_name,
        };
        let created = self.session.register(&registration).await?;
        println!("{}", serde_json::to_string_pretty(&created)?);
        Ok(())
    }

    pub fn lang(&self, code: Option<&str>) -> Result<(), CliError> {
        match code {
            Some(code) => {
                let language = self.language.set_language(code)?;
                println!("Language set to {language}");
            }
            None => println!("{}", self.language.selected()),
        }
        Ok(())
    }

    pub async fn open(&self, path: &str) {
        let target = routes::resolve(path);
        let navigation = self.guard.check(&target).await;
        if navigation == Navigation::Proceed {
            println!(
                "{} ({})",
                target.full_path,
                target.title.as_deref().unwrap_or(routes::DEFAULT_TITLE)
            );
        } else {
            print_navigation(&navigation);
        }
    }
}

fn logout_reason(events: &mut broadcast::Receiver<SessionEvent>) -> Option<LogoutReason> {
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::LoggedOut { reason } = event {
            return Some(reason);
        }
    }
    None
}

fn print_navigation(navigation: &Navigation) {
    if let Some(location) = navigation.location() {
        println!("redirect: {location}");
    }
}

fn prompt(label: &str) -> io::Result<String> {
    let mut stderr = io::stderr();
    stderr.write_all(label.as_bytes())?;
    stderr.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
