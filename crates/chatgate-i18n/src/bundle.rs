//! Fluent bundle management and notice formatting.

use crate::error::{I18nError, I18nResult};
use crate::notice::Notice;
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource};
use std::collections::HashMap;
use tracing::{debug, warn};
use unic_langid::{langid, LanguageIdentifier};

/// Embedded `en-US` notices.
const EN_US_NOTICES: &str = include_str!("../locales/en-US/notices.ftl");

/// Locale every lookup falls back to.
pub const FALLBACK_LOCALE: LanguageIdentifier = langid!("en-US");

type Bundle = FluentBundle<FluentResource>;

/// Renders notices in a preferred locale with `en-US` fallback.
pub struct Notices {
    bundles: HashMap<LanguageIdentifier, Bundle>,
    locale: LanguageIdentifier,
}

impl std::fmt::Debug for Notices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notices")
            .field("locale", &self.locale.to_string())
            .field("bundles", &self.bundles.keys().map(ToString::to_string).collect::<Vec<_>>())
            .finish()
    }
}

impl Notices {
    /// Creates a renderer preferring `locale`; unknown or invalid locales render in `en-US`.
    pub fn new(locale: &str) -> I18nResult<Self> {
        let mut notices = Self {
            bundles: HashMap::new(),
            locale: FALLBACK_LOCALE,
        };
        notices.add_resource(&FALLBACK_LOCALE.to_string(), EN_US_NOTICES)?;

        match locale.parse::<LanguageIdentifier>() {
            Ok(preferred) => notices.locale = preferred,
            Err(_) => warn!(locale, "Invalid locale, using {}", FALLBACK_LOCALE),
        }
        Ok(notices)
    }

    /// The preferred locale.
    pub const fn locale(&self) -> &LanguageIdentifier {
        &self.locale
    }

    /// Adds Fluent source for `locale`, creating its bundle if needed.
    pub fn add_resource(&mut self, locale: &str, source: &str) -> I18nResult<()> {
        let lang: LanguageIdentifier = locale.parse().map_err(|_| I18nError::InvalidLocale {
            locale: locale.to_string(),
        })?;

        let resource = FluentResource::try_new(source.to_string()).map_err(|(_, errors)| I18nError::Resource {
            locale: locale.to_string(),
            errors: errors.iter().map(|e| format!("{e:?}")).collect(),
        })?;

        let bundle = self.bundles.entry(lang.clone()).or_insert_with(|| {
            let mut bundle = FluentBundle::new_concurrent(vec![lang]);
            bundle.set_use_isolating(false);
            bundle
        });

        bundle.add_resource(resource).map_err(|errors| I18nError::Resource {
            locale: locale.to_string(),
            errors: errors.iter().map(|e| format!("{e:?}")).collect(),
        })?;

        debug!(locale, "Added Fluent resource");
        Ok(())
    }

    /// Formats a message by id, trying the preferred locale then `en-US`.
    pub fn format(&self, key: &str, args: Option<&FluentArgs<'_>>) -> I18nResult<String> {
        let bundle = [&self.locale, &FALLBACK_LOCALE]
            .into_iter()
            .filter_map(|lang| self.bundles.get(lang))
            .find(|bundle| bundle.has_message(key))
            .ok_or_else(|| I18nError::MessageNotFound { key: key.to_string() })?;

        let pattern = bundle
            .get_message(key)
            .and_then(|message| message.value())
            .ok_or_else(|| I18nError::MessageNotFound { key: key.to_string() })?;

        let mut errors = Vec::new();
        let formatted = bundle.format_pattern(pattern, args, &mut errors);
        if !errors.is_empty() {
            return Err(I18nError::Format {
                key: key.to_string(),
                errors: errors.iter().map(|e| format!("{e:?}")).collect(),
            });
        }
        Ok(formatted.into_owned())
    }

    /// Renders a notice. Never fails: a missing message renders as its id.
    pub fn render(&self, notice: &Notice) -> String {
        let args = notice.args();
        let mut text = self.format(notice.message_id(), args.as_ref()).unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to raw notice id");
            notice.message_id().to_string()
        });

        if let Some(usage) = notice.usage() {
            let mut usage_args = FluentArgs::new();
            usage_args.set("usage", usage);
            if let Ok(hint) = self.format("usage-hint", Some(&usage_args)) {
                text.push('\n');
                text.push_str(&hint);
            }
        }
        text
    }
}

impl Default for Notices {
    fn default() -> Self {
        let mut bundle = FluentBundle::new_concurrent(vec![FALLBACK_LOCALE]);
        bundle.set_use_isolating(false);
        let mut bundles = HashMap::new();
        // The embedded resource is covered by tests; a parse failure leaves the bundle empty.
        if let Ok(resource) = FluentResource::try_new(EN_US_NOTICES.to_string()) {
            let _ = bundle.add_resource(resource);
        }
        bundles.insert(FALLBACK_LOCALE, bundle);
        Self {
            bundles,
            locale: FALLBACK_LOCALE,
        }
    }
}
