/// Per-request display language, negotiated from `Accept-Language`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    En,
    Zh,
}

impl Lang {
    /// Picks the first supported language range in the header; English when
    /// nothing matches.
    pub fn from_accept_language(header: Option<&str>) -> Self {
        let Some(header) = header else {
            return Lang::En;
        };
        for range in header.split(',') {
            let tag = range.split(';').next().unwrap_or("").trim();
            if let Some(prefix) = tag.get(..2) {
                match prefix.to_ascii_lowercase().as_str() {
                    "zh" => return Lang::Zh,
                    "en" => return Lang::En,
                    _ => {}
                }
            }
        }
        Lang::En
    }

    pub fn html_lang(self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Zh => "zh",
        }
    }

    pub fn load_more(self) -> &'static str {
        match self {
            Lang::En => "Load more",
            Lang::Zh => "加载更多",
        }
    }

    pub fn mark_read(self) -> &'static str {
        match self {
            Lang::En => "Mark all as read",
            Lang::Zh => "全部标记为已读",
        }
    }

    pub fn all_caught_up(self) -> &'static str {
        match self {
            Lang::En => "All caught up!",
            Lang::Zh => "全部看完了！",
        }
    }

    pub fn auth_failed(self) -> &'static str {
        match self {
            Lang::En => "The feed service rejected these credentials.",
            Lang::Zh => "认证失败，请检查登录信息。",
        }
    }

    pub fn generic_error(self) -> &'static str {
        match self {
            Lang::En => "Something went wrong. Please try again later.",
            Lang::Zh => "出错了，请稍后重试。",
        }
    }

    pub fn sign_in(self) -> &'static str {
        match self {
            Lang::En => "Sign in",
            Lang::Zh => "登录",
        }
    }

    pub fn sign_out(self) -> &'static str {
        match self {
            Lang::En => "Sign out",
            Lang::Zh => "退出登录",
        }
    }

    pub fn endpoint_label(self) -> &'static str {
        match self {
            Lang::En => "Fever endpoint",
            Lang::Zh => "Fever 接口地址",
        }
    }

    pub fn username_label(self) -> &'static str {
        match self {
            Lang::En => "Username",
            Lang::Zh => "用户名",
        }
    }

    pub fn password_label(self) -> &'static str {
        match self {
            Lang::En => "Password",
            Lang::Zh => "密码",
        }
    }

    pub fn all_groups(self) -> &'static str {
        match self {
            Lang::En => "All",
            Lang::Zh => "全部",
        }
    }

    pub fn today_filter(self) -> &'static str {
        match self {
            Lang::En => "Today",
            Lang::Zh => "今天",
        }
    }

    pub fn pocket_not_configured(self) -> &'static str {
        match self {
            Lang::En => "Pocket is not configured.",
            Lang::Zh => "Pocket 尚未配置。",
        }
    }

    pub fn added_to_pocket(self, url: &str) -> String {
        match self {
            Lang::En => format!("Added {url} to Pocket"),
            Lang::Zh => format!("已将 {url} 保存到 Pocket"),
        }
    }

    pub fn marked_read(self, count: usize) -> String {
        match self {
            Lang::En => format!("Marked {count} items as read"),
            Lang::Zh => format!("已将 {count} 条标记为已读"),
        }
    }
}
