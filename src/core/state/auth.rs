use super::{Effect, Transition};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub api_key: Option<String>,
}

impl AuthState {
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthAction {
    /// Key read back from the credential store.
    Hydrate(Option<String>),
    SetApiKey(String),
    ClearApiKey,
}

pub fn apply(state: AuthState, action: AuthAction) -> Transition<AuthState> {
    match action {
        AuthAction::Hydrate(api_key) => Transition::new(AuthState {
            api_key: api_key.filter(|key| !key.is_empty()),
        }),
        AuthAction::SetApiKey(api_key) => {
            let api_key = api_key.trim().to_string();
            if api_key.is_empty() {
                return apply(state, AuthAction::ClearApiKey);
            }
            Transition::with_effects(
                AuthState {
                    api_key: Some(api_key.clone()),
                },
                vec![Effect::StoreApiKey(api_key)],
            )
        }
        AuthAction::ClearApiKey => {
            Transition::with_effects(AuthState { api_key: None }, vec![Effect::ClearApiKey])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_clear_emit_credential_effects() {
        let set = apply(AuthState::default(), AuthAction::SetApiKey(" sk-1 ".to_string()));
        assert!(set.state.has_api_key());
        assert_eq!(set.effects, vec![Effect::StoreApiKey("sk-1".to_string())]);

        let cleared = apply(set.state, AuthAction::ClearApiKey);
        assert!(!cleared.state.has_api_key());
        assert_eq!(cleared.effects, vec![Effect::ClearApiKey]);
    }

    #[test]
    fn blank_key_clears() {
        let state = AuthState {
            api_key: Some("old".to_string()),
        };
        let transition = apply(state, AuthAction::SetApiKey("   ".to_string()));
        assert_eq!(transition.state.api_key, None);
        assert_eq!(transition.effects, vec![Effect::ClearApiKey]);

        let hydrated = apply(AuthState::default(), AuthAction::Hydrate(Some(String::new())));
        assert!(!hydrated.state.has_api_key());
        assert!(hydrated.effects.is_empty());
    }
}
