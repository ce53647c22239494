use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub signing_key: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaimsWire {
    sub: String, // user id
    sid: String, // session id
    role: Role,
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    jti: String,
}

#[derive(Debug, Deserialize)]
struct JtiOnly {
    jti: String,
}

#[derive(Debug, Deserialize)]
struct ExpOnly {
    exp: i64,
}

fn timestamp_to_utc(ts: i64) -> Result<DateTime<Utc>, AuthError> {
    DateTime::<Utc>::from_timestamp(ts, 0).ok_or(AuthError::TokenInvalid)
}

/// HS256 JWT access tokens. Stateless: validity is the signature and `exp`,
/// revocation is layered on top by the blacklist.
pub struct JwtHs256Issuer {
    cfg: JwtConfig,
}

impl JwtHs256Issuer {
    pub fn new(cfg: JwtConfig) -> Self {
        JwtHs256Issuer { cfg }
    }

    #[inline]
    fn gen_jti() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn strict_validation(&self) -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        v.validate_exp = true;
        v.leeway = 0;
        v.set_audience(&[self.cfg.audience.clone()]);
        v.set_issuer(&[self.cfg.issuer.clone()]);
        v
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(&self.cfg.signing_key)
    }
}

#[async_trait::async_trait]
impl AccessTokenIssuer for JwtHs256Issuer {
    async fn issue(
        &self,
        user_id: UserId,
        role: Role,
        session_id: SessionId,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError> {
        let iat = Utc::now().timestamp();
        let exp = iat + self.cfg.access_ttl.num_seconds();
        let claims = AccessClaimsWire {
            sub: user_id.to_string(),
            sid: session_id.to_string(),
            role,
            exp,
            iat,
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            jti: Self::gen_jti(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.cfg.signing_key),
        )
        .map_err(|e| AuthError::InternalError(format!("sign access token: {e}")))?;
        Ok((AccessToken(token), timestamp_to_utc(exp)?))
    }

    async fn verify(&self, token: &AccessToken) -> Result<AccessClaims, AuthError> {
        let data = decode::<AccessClaimsWire>(&token.0, &self.decoding_key(), &self.strict_validation())
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid,
            })?;
        let claims = data.claims;
        Ok(AccessClaims {
            user_id: claims.sub.parse().map_err(|_| AuthError::TokenInvalid)?,
            session_id: claims.sid.parse().map_err(|_| AuthError::TokenInvalid)?,
            role: claims.role,
            token_id: TokenId(claims.jti),
            expires_at: timestamp_to_utc(claims.exp)?,
        })
    }

    async fn expiry(&self, token: &AccessToken) -> Result<DateTime<Utc>, AuthError> {
        // Signature still checked: a forged `exp` must not stretch a
        // blacklist entry past the real token's lifetime.
        let mut v = self.strict_validation();
        v.validate_exp = false;
        let data = decode::<ExpOnly>(&token.0, &self.decoding_key(), &v)
            .map_err(|_| AuthError::TokenInvalid)?;
        timestamp_to_utc(data.claims.exp)
    }

    async fn extract_id(&self, token: &AccessToken) -> Result<TokenId, AuthError> {
        let mut v = Validation::new(Algorithm::HS256);
        v.insecure_disable_signature_validation();
        v.validate_exp = false;
        v.validate_aud = false;
        v.required_spec_claims.clear();
        let data = decode::<JtiOnly>(&token.0, &DecodingKey::from_secret(&[]), &v)
            .map_err(|_| AuthError::TokenInvalid)?;
        if data.claims.jti.is_empty() {
            return Err(AuthError::TokenInvalid);
        }
        Ok(TokenId(data.claims.jti))
    }
}
