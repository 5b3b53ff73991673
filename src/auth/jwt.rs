use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use tracing::debug;

use super::claims::Claims;
use crate::config::JwtConfig;

/// Verifies bearer tokens against the provider's shared secret.
#[derive(Clone)]
pub struct JwtKeys {
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(std::slice::from_ref(&cfg.audience));
        if let Some(issuer) = &cfg.issuer {
            validation.set_issuer(std::slice::from_ref(issuer));
        }
        Self {
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        if data.claims.is_anonymous() {
            anyhow::bail!("anonymous token");
        }
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

/// Mints tokens the way the auth provider does, for tests only.
#[cfg(test)]
pub mod testing {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::Claims;

    pub const SECRET: &str = "test-secret";
    pub const AUDIENCE: &str = "authenticated";

    pub fn claims_for(user_id: Uuid) -> Claims {
        let now = OffsetDateTime::now_utc().unix_timestamp() as usize;
        Claims {
            sub: user_id,
            exp: now + 3600,
            iat: Some(now),
            aud: AUDIENCE.into(),
            iss: None,
            email: Some(format!("{user_id}@example.com")),
            role: Some("authenticated".into()),
        }
    }

    pub fn sign(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("sign test token")
    }

    pub fn token_for(user_id: Uuid) -> String {
        sign(&claims_for(user_id), SECRET)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use uuid::Uuid;

    fn keys(audience: &str, issuer: Option<&str>) -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: SECRET.into(),
            audience: audience.into(),
            issuer: issuer.map(str::to_string),
        })
    }

    #[test]
    fn verifies_provider_token() {
        let user_id = Uuid::new_v4();
        let claims = keys(AUDIENCE, None).verify(&token_for(user_id)).expect("verify");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role.as_deref(), Some("authenticated"));
    }

    #[test]
    fn rejects_wrong_audience() {
        let token = token_for(Uuid::new_v4());
        assert!(keys("someone-else", None).verify(&token).is_err());
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = sign(&claims_for(Uuid::new_v4()), "other-secret");
        assert!(keys(AUDIENCE, None).verify(&token).is_err());
    }

    #[test]
    fn rejects_issuer_mismatch_when_configured() {
        let mut claims = claims_for(Uuid::new_v4());
        claims.iss = Some("https://evil.example/auth/v1".into());
        let token = sign(&claims, SECRET);
        assert!(keys(AUDIENCE, Some("https://project.example/auth/v1"))
            .verify(&token)
            .is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let mut claims = claims_for(Uuid::new_v4());
        claims.exp = 1_000;
        let token = sign(&claims, SECRET);
        assert!(keys(AUDIENCE, None).verify(&token).is_err());
    }

    #[test]
    fn rejects_anon_role() {
        let mut claims = claims_for(Uuid::new_v4());
        claims.role = Some("anon".into());
        let err = keys(AUDIENCE, None).verify(&sign(&claims, SECRET)).unwrap_err();
        assert!(err.to_string().contains("anonymous"));
    }
}
