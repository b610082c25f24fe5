use actix_multipart::Multipart;
use actix_web::{
    HttpRequest, HttpResponse, get,
    http::{Method, header},
    web,
};
use futures_util::TryStreamExt;
use serde::Deserialize;
use serde_json::json;

use crate::{FilesService, actions, error::ApiError, resolve};

pub fn register(cfg: &mut web::ServiceConfig, svc: web::Data<FilesService>) {
    let prefix = svc.prefix.clone();
    cfg.service(health).service(
        web::scope(&prefix)
            .app_data(svc)
            .route("/{path:.*}", web::get().to(get_resource))
            .route("/{path:.*}", web::post().to(post_resource))
            .route("/{path:.*}", web::put().to(put_resource))
            .route("/{path:.*}", web::delete().to(delete_resource)),
    );
}

#[get("/healthz")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": "shelf-backend",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// JSON payload of a POST/PUT request. Which fields are present decides
/// the action; see [`FileAction::classify`].
#[derive(Debug, Default, Deserialize)]
pub struct ActionBody {
    pub url: Option<String>,
    pub destination: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub id: Option<String>,
}

/// Every request shape the API accepts, classified once at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileAction {
    List,
    Show,
    Upload,
    CreateDir,
    CopyLocal {
        source: String,
    },
    CopyRemote {
        url: String,
        name: Option<String>,
        replace: bool,
    },
    Move {
        destination: String,
    },
    Rename {
        name: String,
    },
    OverwriteText {
        text: String,
    },
    Delete,
}

impl FileAction {
    /// Field priority is fixed: `url`, then `destination`, then `name`,
    /// then `text`, then the `id` source path. Exactly one action fires
    /// per request; anything unclassifiable is a 400.
    pub fn classify(
        method: &Method,
        multipart: bool,
        dir_hint: bool,
        body: ActionBody,
    ) -> Result<Self, ApiError> {
        match method.as_str() {
            "GET" if dir_hint => Ok(Self::List),
            "GET" => Ok(Self::Show),
            "DELETE" => Ok(Self::Delete),
            "POST" if multipart => Ok(Self::Upload),
            "POST" => {
                if let Some(url) = body.url {
                    Ok(Self::CopyRemote {
                        url,
                        name: body.name,
                        replace: false,
                    })
                } else if let Some(source) = body.id {
                    Ok(Self::CopyLocal { source })
                } else if dir_hint {
                    Ok(Self::CreateDir)
                } else {
                    Err(ApiError::BadRequest(
                        "expected multipart form data, a url or id field, or a directory path"
                            .into(),
                    ))
                }
            }
            "PUT" => {
                if let Some(url) = body.url {
                    Ok(Self::CopyRemote {
                        url,
                        name: None,
                        replace: true,
                    })
                } else if let Some(destination) = body.destination {
                    Ok(Self::Move { destination })
                } else if let Some(name) = body.name {
                    Ok(Self::Rename { name })
                } else if let Some(text) = body.text {
                    Ok(Self::OverwriteText { text })
                } else if let Some(source) = body.id {
                    Ok(Self::CopyLocal { source })
                } else {
                    Err(ApiError::BadRequest(
                        "expected a url, destination, name, text or id field".into(),
                    ))
                }
            }
            _ => Err(ApiError::BadRequest(format!(
                "unsupported method {method}"
            ))),
        }
    }
}

async fn get_resource(
    req: HttpRequest,
    svc: web::Data<FilesService>,
) -> Result<HttpResponse, ApiError> {
    let target = resolve_request(&req, &svc)?;
    let action = FileAction::classify(req.method(), false, target.dir_hint, ActionBody::default())?;
    actions::dispatch(&svc, action, target).await
}

async fn post_resource(
    req: HttpRequest,
    payload: web::Payload,
    svc: web::Data<FilesService>,
) -> Result<HttpResponse, ApiError> {
    let target = resolve_request(&req, &svc)?;
    if is_multipart(&req) {
        let form = Multipart::new(req.headers(), payload);
        return actions::upload(&svc, &target, form).await;
    }
    let body = read_body(payload).await?;
    let action = FileAction::classify(req.method(), false, target.dir_hint, body)?;
    actions::dispatch(&svc, action, target).await
}

async fn put_resource(
    req: HttpRequest,
    payload: web::Payload,
    svc: web::Data<FilesService>,
) -> Result<HttpResponse, ApiError> {
    let target = resolve_request(&req, &svc)?;
    let body = read_body(payload).await?;
    let action = FileAction::classify(req.method(), false, target.dir_hint, body)?;
    actions::dispatch(&svc, action, target).await
}

async fn delete_resource(
    req: HttpRequest,
    svc: web::Data<FilesService>,
) -> Result<HttpResponse, ApiError> {
    let target = resolve_request(&req, &svc)?;
    let action = FileAction::classify(req.method(), false, target.dir_hint, ActionBody::default())?;
    actions::dispatch(&svc, action, target).await
}

// raw, still-encoded path minus the mount prefix; the resolver owns decoding
fn resolve_request(
    req: &HttpRequest,
    svc: &FilesService,
) -> Result<resolve::Resolved, ApiError> {
    let tail = req
        .path()
        .strip_prefix(svc.prefix.as_str())
        .unwrap_or_else(|| req.path());
    resolve::resolve(&svc.base_dir, tail)
}

fn is_multipart(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("multipart/form-data"))
        .unwrap_or(false)
}

async fn read_body(mut payload: web::Payload) -> Result<ActionBody, ApiError> {
    let mut bytes = web::BytesMut::new();
    while let Some(chunk) = payload
        .try_next()
        .await
        .map_err(|err| ApiError::BadRequest(format!("failed to read request body: {err}")))?
    {
        bytes.extend_from_slice(&chunk);
    }
    if bytes.is_empty() {
        return Ok(ActionBody::default());
    }
    serde_json::from_slice(&bytes)
        .map_err(|err| ApiError::BadRequest(format!("invalid JSON body: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: serde_json::Value) -> ActionBody {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn get_splits_on_trailing_slash() {
        let list = FileAction::classify(&Method::GET, false, true, ActionBody::default()).unwrap();
        assert_eq!(list, FileAction::List);
        let show = FileAction::classify(&Method::GET, false, false, ActionBody::default()).unwrap();
        assert_eq!(show, FileAction::Show);
    }

    #[test]
    fn post_multipart_wins_over_everything() {
        let action = FileAction::classify(
            &Method::POST,
            true,
            true,
            body(serde_json::json!({"url": "http://x", "id": "/a"})),
        )
        .unwrap();
        assert_eq!(action, FileAction::Upload);
    }

    #[test]
    fn post_url_beats_source_id() {
        let action = FileAction::classify(
            &Method::POST,
            false,
            false,
            body(serde_json::json!({"url": "http://x/kitty.bin", "name": "kitty.bin", "id": "/a"})),
        )
        .unwrap();
        assert_eq!(
            action,
            FileAction::CopyRemote {
                url: "http://x/kitty.bin".into(),
                name: Some("kitty.bin".into()),
                replace: false,
            }
        );
    }

    #[test]
    fn post_bare_json_with_trailing_slash_creates_dir() {
        let action =
            FileAction::classify(&Method::POST, false, true, ActionBody::default()).unwrap();
        assert_eq!(action, FileAction::CreateDir);
    }

    #[test]
    fn post_source_id_copies_even_into_a_dir_path() {
        let action = FileAction::classify(
            &Method::POST,
            false,
            true,
            body(serde_json::json!({"id": "/plaid-kitty.jpg"})),
        )
        .unwrap();
        assert_eq!(
            action,
            FileAction::CopyLocal {
                source: "/plaid-kitty.jpg".into()
            }
        );
    }

    #[test]
    fn post_bare_json_without_slash_is_rejected() {
        let err = FileAction::classify(&Method::POST, false, false, ActionBody::default())
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn put_url_beats_destination_and_name() {
        let action = FileAction::classify(
            &Method::PUT,
            false,
            false,
            body(serde_json::json!({"url": "http://x", "destination": "/d/", "name": "n"})),
        )
        .unwrap();
        assert_eq!(
            action,
            FileAction::CopyRemote {
                url: "http://x".into(),
                name: None,
                replace: true,
            }
        );
    }

    #[test]
    fn put_destination_beats_name_and_text() {
        let action = FileAction::classify(
            &Method::PUT,
            false,
            false,
            body(serde_json::json!({"destination": "/archive/", "name": "n", "text": "t"})),
        )
        .unwrap();
        assert_eq!(
            action,
            FileAction::Move {
                destination: "/archive/".into()
            }
        );
    }

    #[test]
    fn put_name_beats_text() {
        let action = FileAction::classify(
            &Method::PUT,
            false,
            false,
            body(serde_json::json!({"name": "renamed.jpg", "text": "t"})),
        )
        .unwrap();
        assert_eq!(
            action,
            FileAction::Rename {
                name: "renamed.jpg".into()
            }
        );
    }

    #[test]
    fn put_text_overwrites() {
        let action = FileAction::classify(
            &Method::PUT,
            false,
            false,
            body(serde_json::json!({"text": "hello"})),
        )
        .unwrap();
        assert_eq!(
            action,
            FileAction::OverwriteText {
                text: "hello".into()
            }
        );
    }

    #[test]
    fn put_source_id_is_the_lowest_priority_copy() {
        let action = FileAction::classify(
            &Method::PUT,
            false,
            false,
            body(serde_json::json!({"id": "/plaid-kitty.jpg"})),
        )
        .unwrap();
        assert_eq!(
            action,
            FileAction::CopyLocal {
                source: "/plaid-kitty.jpg".into()
            }
        );
    }

    #[test]
    fn unknown_methods_are_rejected() {
        let err = FileAction::classify(&Method::PATCH, false, false, ActionBody::default())
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
