//! Authentication (spec.md §4.9): queries `PROTOCOLINFO`, then tries every
//! method it advertises in preference order NONE → SAFECOOKIE → COOKIE →
//! PASSWORD, stopping at the first success.

use std::path::Path;

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use torctl_proto::response::protocolinfo::{self, AuthMethod};

use crate::controller::Controller;
use crate::error::{AuthenticationFailure, ControllerError};

const SERVER_HASH_CONSTANT: &[u8] = b"Tor safe cookie authentication server-to-controller hash";
const CLIENT_HASH_CONSTANT: &[u8] = b"Tor safe cookie authentication controller-to-server hash";
const COOKIE_LEN: usize = 32;
const NONCE_LEN: usize = 32;

type HmacSha256 = Hmac<Sha256>;

pub async fn authenticate(controller: &Controller, password: Option<&str>) -> Result<(), ControllerError> {
    let reply = controller.raw_msg("PROTOCOLINFO 1").await?;
    let info = protocolinfo::parse(&reply)?;

    let mut failures = Vec::new();

    for method in ordered_methods(&info.auth_methods) {
        let result = match method {
            AuthMethod::Null => try_none(controller).await,
            AuthMethod::SafeCookie => try_safe_cookie(controller, info.cookie_file.as_deref()).await,
            AuthMethod::Cookie => try_cookie(controller, info.cookie_file.as_deref()).await,
            AuthMethod::Password => try_password(controller, password).await,
        };
        match result {
            Ok(()) => return Ok(()),
            // A dead socket dooms every remaining method too; report it
            // directly instead of letting it masquerade as a rejection by
            // whichever method happened to be running.
            Err(err @ (ControllerError::Socket(_) | ControllerError::NotConnected)) => return Err(err),
            Err(ControllerError::Auth(failure)) => failures.push(failure),
            Err(other) => return Err(other),
        }
    }

    match AuthenticationFailure::most_severe(failures) {
        Some(failure) => Err(failure.into()),
        None => Err(AuthenticationFailure::UnrecognizedAuthChallengeMethod.into()),
    }
}

/// NONE → SAFECOOKIE → COOKIE → PASSWORD, restricted to what the server
/// actually advertised.
fn ordered_methods(advertised: &[AuthMethod]) -> Vec<AuthMethod> {
    [AuthMethod::Null, AuthMethod::SafeCookie, AuthMethod::Cookie, AuthMethod::Password]
        .into_iter()
        .filter(|m| advertised.contains(m))
        .collect()
}

/// Maps a failed attempt to its method-specific rejection reason, except a
/// socket-level failure is passed through unchanged so it can short-circuit
/// `authenticate` instead of being reported as that method's rejection.
fn rejected_as(err: ControllerError, fallback: AuthenticationFailure) -> ControllerError {
    match err {
        ControllerError::Socket(_) | ControllerError::NotConnected => err,
        _ => fallback.into(),
    }
}

async fn try_none(controller: &Controller) -> Result<(), ControllerError> {
    send_authenticate(controller, "AUTHENTICATE")
        .await
        .map_err(|err| rejected_as(err, AuthenticationFailure::OpenAuthRejected))
}

async fn try_password(controller: &Controller, password: Option<&str>) -> Result<(), ControllerError> {
    let password = password.ok_or(AuthenticationFailure::PasswordAuthRejected)?;
    let escaped = password.replace('\\', "\\\\").replace('"', "\\\"");
    send_authenticate(controller, &format!("AUTHENTICATE \"{escaped}\""))
        .await
        .map_err(|err| rejected_as(err, AuthenticationFailure::IncorrectPassword))
}

async fn try_cookie(controller: &Controller, cookie_file: Option<&str>) -> Result<(), ControllerError> {
    let cookie = read_cookie(cookie_file)?;
    send_authenticate(controller, &format!("AUTHENTICATE {}", hex::encode(cookie)))
        .await
        .map_err(|err| rejected_as(err, AuthenticationFailure::CookieAuthRejected))
}

async fn try_safe_cookie(controller: &Controller, cookie_file: Option<&str>) -> Result<(), ControllerError> {
    let cookie = read_cookie(cookie_file)?;

    let mut client_nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut client_nonce);

    let reply = controller
        .raw_msg(&format!("AUTHCHALLENGE SAFECOOKIE {}", hex::encode(client_nonce)))
        .await
        .map_err(|err| rejected_as(err, AuthenticationFailure::UnrecognizedAuthChallengeMethod))?;
    let challenge = torctl_proto::response::authchallenge::parse(&reply)
        .map_err(|e| AuthenticationFailure::AuthChallengeFailed(e.to_string()))?;

    let expected_server_hash = keyed_hmac(SERVER_HASH_CONSTANT, &cookie, &client_nonce, &challenge.server_nonce);
    if expected_server_hash != challenge.server_hash {
        return Err(AuthenticationFailure::AuthSecurityFailure.into());
    }

    let client_hash = keyed_hmac(CLIENT_HASH_CONSTANT, &cookie, &client_nonce, &challenge.server_nonce);
    send_authenticate(controller, &format!("AUTHENTICATE {}", hex::encode(client_hash)))
        .await
        .map_err(|err| rejected_as(err, AuthenticationFailure::IncorrectCookieValue))
}

fn keyed_hmac(key: &[u8], cookie: &[u8], client_nonce: &[u8], server_nonce: &[u8]) -> Vec<u8> {
    // unwrap: HMAC-SHA256 accepts any key length.
    let mut mac = HmacSha256::new_from_slice(key).unwrap();
    mac.update(cookie);
    mac.update(client_nonce);
    mac.update(server_nonce);
    mac.finalize().into_bytes().to_vec()
}

fn read_cookie(cookie_file: Option<&str>) -> Result<Vec<u8>, AuthenticationFailure> {
    let path = cookie_file.ok_or(AuthenticationFailure::UnreadableCookieFile {
        path: String::new(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "no COOKIEFILE advertised"),
    })?;
    let bytes = std::fs::read(Path::new(path)).map_err(|source| AuthenticationFailure::UnreadableCookieFile {
        path: path.to_owned(),
        source,
    })?;
    if bytes.len() != COOKIE_LEN {
        return Err(AuthenticationFailure::IncorrectCookieSize { actual: bytes.len() });
    }
    Ok(bytes)
}

async fn send_authenticate(controller: &Controller, command: &str) -> Result<(), ControllerError> {
    let reply = controller.raw_msg(command).await?;
    torctl_proto::response::singleline::parse(&reply)?;
    Ok(())
}
