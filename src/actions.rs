use std::io;
use std::path::{Path, PathBuf};

use actix_multipart::{Field, Multipart};
use actix_web::HttpResponse;
use futures_util::TryStreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::FilesService;
use crate::error::ApiError;
use crate::models::resource::{build_model, sort_models};
use crate::resolve::{Resolved, is_hidden, resolve, slugify};
use crate::routes::FileAction;

pub async fn dispatch(
    svc: &FilesService,
    action: FileAction,
    target: Resolved,
) -> Result<HttpResponse, ApiError> {
    match action {
        FileAction::List => list(svc, &target).await,
        FileAction::Show => show(svc, &target).await,
        FileAction::CreateDir => create_dir(svc, &target).await,
        FileAction::CopyLocal { source } => copy_local(svc, &target, &source).await,
        FileAction::CopyRemote { url, name, replace } => {
            copy_remote(svc, &target, &url, name.as_deref(), replace).await
        }
        FileAction::Move { destination } => move_entry(svc, &target, &destination).await,
        FileAction::Rename { name } => rename(svc, &target, &name).await,
        FileAction::OverwriteText { text } => overwrite_text(svc, &target, &text).await,
        FileAction::Delete => delete(&target).await,
        FileAction::Upload => Err(ApiError::BadRequest(
            "file uploads must be multipart/form-data".into(),
        )),
    }
}

async fn list(svc: &FilesService, target: &Resolved) -> Result<HttpResponse, ApiError> {
    let mut dir = fs::read_dir(&target.fs_path)
        .await
        .map_err(|err| fs_err(err, &target.id))?;

    let mut models = Vec::new();
    while let Some(entry) = dir.next_entry().await.map_err(ApiError::Io)? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) {
            continue;
        }
        let meta = entry.metadata().await.map_err(ApiError::Io)?;
        let child_id = format!("{}{}", target.dir_id(), name);
        let model = build_model(&svc.base_url, &child_id, &entry.path(), &meta).await?;
        models.push(model);
    }

    sort_models(&mut models);
    Ok(HttpResponse::Ok().json(models))
}

async fn show(svc: &FilesService, target: &Resolved) -> Result<HttpResponse, ApiError> {
    let meta = fs::metadata(&target.fs_path)
        .await
        .map_err(|err| fs_err(err, &target.id))?;
    let model = build_model(&svc.base_url, &target.id, &target.fs_path, &meta).await?;
    Ok(HttpResponse::Ok().json(model))
}

async fn create_dir(svc: &FilesService, target: &Resolved) -> Result<HttpResponse, ApiError> {
    let raw_name = target
        .name()
        .ok_or_else(|| ApiError::BadRequest("cannot create the tree root".into()))?;
    let clean = slugify(raw_name);
    if clean.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "unusable directory name: {raw_name}"
        )));
    }

    let path = target.fs_path.with_file_name(&clean);
    let id = format!("{}{}/", target.parent_id(), clean);
    fs::create_dir(&path).await.map_err(|err| fs_err(err, &id))?;

    respond_with(svc, id, path).await
}

pub async fn upload(
    svc: &FilesService,
    target: &Resolved,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let mut models = Vec::new();

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|err| ApiError::BadRequest(format!("multipart error: {err}")))?
    {
        let content_disposition = field.content_disposition().clone();
        let Some(filename) = content_disposition.get_filename() else {
            // non-file fields are ignored
            drain_field(&mut field).await?;
            continue;
        };

        let clean = slugify(filename);
        if clean.is_empty() {
            return Err(ApiError::BadRequest(format!(
                "unusable upload filename: {filename}"
            )));
        }

        let dest_path = target.fs_path.join(&clean);
        let dest_id = format!("{}{}", target.dir_id(), clean);
        let mut file = fs::File::create(&dest_path)
            .await
            .map_err(|err| fs_err(err, &dest_id))?;

        let outcome: Result<(), ApiError> = async {
            while let Some(chunk) = field
                .try_next()
                .await
                .map_err(|err| ApiError::BadRequest(format!("failed to read field: {err}")))?
            {
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok(())
        }
        .await;
        if let Err(err) = outcome {
            let _ = fs::remove_file(&dest_path).await;
            return Err(err);
        }

        let meta = fs::metadata(&dest_path).await?;
        models.push(build_model(&svc.base_url, &dest_id, &dest_path, &meta).await?);
    }

    Ok(HttpResponse::Ok().json(models))
}

async fn copy_local(
    svc: &FilesService,
    target: &Resolved,
    source_path: &str,
) -> Result<HttpResponse, ApiError> {
    let source = resolve(&svc.base_dir, source_path)?;
    let source_name = source
        .name()
        .ok_or_else(|| ApiError::BadRequest("copy source has no name".into()))?;

    // a directory target keeps the source's name; otherwise the target
    // path supplies the new one
    let (dest_path, dest_id) = if target.dir_hint {
        (
            target.fs_path.join(source_name),
            format!("{}{}", target.dir_id(), source_name),
        )
    } else {
        (target.fs_path.clone(), target.id.clone())
    };

    let mut reader = fs::File::open(&source.fs_path)
        .await
        .map_err(|err| fs_err(err, &source.id))?;
    let mut writer = fs::File::create(&dest_path)
        .await
        .map_err(|err| fs_err(err, &dest_id))?;

    let outcome: Result<(), ApiError> = async {
        tokio::io::copy(&mut reader, &mut writer).await?;
        writer.flush().await?;
        Ok(())
    }
    .await;
    if let Err(err) = outcome {
        let _ = fs::remove_file(&dest_path).await;
        return Err(err);
    }

    respond_with(svc, dest_id, dest_path).await
}

async fn copy_remote(
    svc: &FilesService,
    target: &Resolved,
    url: &str,
    name: Option<&str>,
    replace: bool,
) -> Result<HttpResponse, ApiError> {
    let (dest_path, dest_id) = if replace {
        if target.name().is_none() {
            return Err(ApiError::BadRequest("cannot overwrite the tree root".into()));
        }
        (target.fs_path.clone(), target.id.clone())
    } else {
        let name =
            name.ok_or_else(|| ApiError::BadRequest("remote copy requires a name".into()))?;
        let clean = slugify(name);
        if clean.is_empty() {
            return Err(ApiError::BadRequest(format!("unusable name: {name}")));
        }
        (
            target.fs_path.join(&clean),
            format!("{}{}", target.dir_id(), clean),
        )
    };

    let file_name = dest_path
        .file_name()
        .and_then(|value| value.to_str())
        .ok_or_else(|| ApiError::BadRequest("destination has no name".into()))?;
    // hidden while in flight, renamed into place once the fetch completes
    let tmp_path = dest_path.with_file_name(format!(".{file_name}.download"));

    let response = svc.http.get(url).send().await?.error_for_status()?;
    let mut stream = response.bytes_stream();
    let mut file = fs::File::create(&tmp_path)
        .await
        .map_err(|err| fs_err(err, &dest_id))?;

    let outcome: Result<(), ApiError> = async {
        while let Some(chunk) = stream.try_next().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
    .await;
    if let Err(err) = outcome {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(err);
    }

    fs::rename(&tmp_path, &dest_path)
        .await
        .map_err(ApiError::Io)?;

    respond_with(svc, dest_id, dest_path).await
}

async fn move_entry(
    svc: &FilesService,
    target: &Resolved,
    destination: &str,
) -> Result<HttpResponse, ApiError> {
    let name = target
        .name()
        .ok_or_else(|| ApiError::BadRequest("cannot move the tree root".into()))?;
    let meta = fs::metadata(&target.fs_path)
        .await
        .map_err(|err| fs_err(err, &target.id))?;

    // the destination is always a directory the source moves into
    let dest_dir = resolve(&svc.base_dir, destination)?;
    let dest_path = dest_dir.fs_path.join(name);
    let suffix = if meta.is_dir() { "/" } else { "" };
    let dest_id = format!("{}{}{}", dest_dir.dir_id(), name, suffix);

    if fs::metadata(&dest_path).await.is_ok() {
        return Err(ApiError::Conflict(dest_id));
    }

    relocate(&target.fs_path, &dest_path)
        .await
        .map_err(|err| fs_err(err, &dest_id))?;

    respond_with(svc, dest_id, dest_path).await
}

async fn rename(
    svc: &FilesService,
    target: &Resolved,
    new_name: &str,
) -> Result<HttpResponse, ApiError> {
    if target.name().is_none() {
        return Err(ApiError::BadRequest("cannot rename the tree root".into()));
    }
    let clean = slugify(new_name);
    if clean.is_empty() {
        return Err(ApiError::BadRequest(format!("unusable name: {new_name}")));
    }

    let meta = fs::metadata(&target.fs_path)
        .await
        .map_err(|err| fs_err(err, &target.id))?;

    let dest_path = target.fs_path.with_file_name(&clean);
    let suffix = if meta.is_dir() { "/" } else { "" };
    let dest_id = format!("{}{}{}", target.parent_id(), clean, suffix);

    if fs::metadata(&dest_path).await.is_ok() {
        return Err(ApiError::Conflict(dest_id));
    }

    relocate(&target.fs_path, &dest_path)
        .await
        .map_err(|err| fs_err(err, &dest_id))?;

    respond_with(svc, dest_id, dest_path).await
}

async fn overwrite_text(
    svc: &FilesService,
    target: &Resolved,
    text: &str,
) -> Result<HttpResponse, ApiError> {
    fs::write(&target.fs_path, text)
        .await
        .map_err(|err| fs_err(err, &target.id))?;
    respond_with(svc, target.id.clone(), target.fs_path.clone()).await
}

async fn delete(target: &Resolved) -> Result<HttpResponse, ApiError> {
    let meta = fs::metadata(&target.fs_path)
        .await
        .map_err(|err| fs_err(err, &target.id))?;

    let file_type = meta.file_type();
    if file_type.is_file() {
        fs::remove_file(&target.fs_path).await?;
    } else if file_type.is_dir() {
        fs::remove_dir_all(&target.fs_path).await?;
    } else {
        return Err(ApiError::UnsupportedType(target.id.clone()));
    }

    Ok(HttpResponse::NoContent().finish())
}

async fn respond_with(
    svc: &FilesService,
    id: String,
    path: PathBuf,
) -> Result<HttpResponse, ApiError> {
    let meta = fs::metadata(&path).await.map_err(ApiError::Io)?;
    let model = build_model(&svc.base_url, &id, &path, &meta).await?;
    Ok(HttpResponse::Ok().json(model))
}

async fn drain_field(field: &mut Field) -> Result<(), ApiError> {
    while field
        .try_next()
        .await
        .map_err(|err| ApiError::BadRequest(format!("failed to read field: {err}")))?
        .is_some()
    {}
    Ok(())
}

// files crossing mounts fall back to copy + unlink
async fn relocate(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst).await {
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(src, dst).await?;
            fs::remove_file(src).await
        }
        other => other,
    }
}

fn fs_err(err: io::Error, what: &str) -> ApiError {
    match err.kind() {
        io::ErrorKind::NotFound => ApiError::NotFound(what.to_string()),
        io::ErrorKind::AlreadyExists => ApiError::Conflict(what.to_string()),
        io::ErrorKind::NotADirectory => ApiError::BadRequest(format!("{what} is not a directory")),
        _ => ApiError::Io(err),
    }
}
