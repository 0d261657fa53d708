use std::str::FromStr;

/// Language used for user-facing hints folded into relayed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Cn,
}

impl Locale {
    /// Shown when the upstream answered 401.
    pub fn unauthorized_hint(&self) -> &'static str {
        match self {
            Locale::En => "Unauthorized access, please enter access code in [auth](/#/auth) page, or enter your OpenAI API Key.",
            Locale::Cn => "访问密码不正确或为空，请前往[登录](/#/auth)页输入正确的访问密码，或者在[设置](/#/settings)页填入你自己的 OpenAI API Key。",
        }
    }
}

impl FromStr for Locale {
    type Err = std::convert::Infallible;

    /// Unknown codes fall back to English.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "cn" | "zh" | "zh-cn" | "zh_cn" => Locale::Cn,
            _ => Locale::En,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_locale() {
        assert_eq!("cn".parse::<Locale>().unwrap(), Locale::Cn);
        assert_eq!("zh-CN".parse::<Locale>().unwrap(), Locale::Cn);
        assert_eq!("en".parse::<Locale>().unwrap(), Locale::En);
        assert_eq!("fr".parse::<Locale>().unwrap(), Locale::En);
    }

    #[test]
    fn test_hints_point_to_auth_page() {
        assert!(Locale::En.unauthorized_hint().contains("(/#/auth)"));
        assert!(Locale::Cn.unauthorized_hint().contains("(/#/auth)"));
    }
}
