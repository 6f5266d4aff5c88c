use bytes::Bytes;

use crate::{
    err::{DecodeError, DecodeErrorKind},
    io::decode_utf8,
    qos::QosLevel,
};

#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Debug)]
pub struct TopicFilter(Vec<TopicToken>);

impl TopicFilter {
    pub fn decode(bytes: &mut Bytes) -> Result<Self, DecodeError> {
        let string = decode_utf8(bytes)?;
        let tokens = Self::from_str(string.as_str())?;
        return Ok(tokens);
    }

    pub fn from_str(str: &'_ str) -> Result<Self, DecodeError> {
        if str.len() == 0 {
            return Err(DecodeError::new(
                DecodeErrorKind::MalformedTopicFilter,
                format!("Invalid topic filter, filter contains no bytes."),
            ));
        }

        let mut tokens = Vec::new();
        let mut strs = str.split('/').peekable();

        loop {
            if let Some(str) = strs.next() {
                let token = TopicToken::from_str(str);

                match token {
                    TopicToken::MultiLevel => {
                        if strs.peek().is_some() {
                            return Err(DecodeError::new(
                                DecodeErrorKind::MalformedTopicFilter,
                                format!("Invalid topic filter: {str}"),
                            ));
                        }
                    }
                    _ => {}
                }
                tokens.push(token);
            } else {
                break;
            }
        }

        return Ok(Self(tokens));
    }

    //TODO: this is really inefficient...
    pub fn to_string(self) -> String {
        let mut string = String::new();
        for token in self.into_iter() {
            string += token.as_str();
        }
        return string;
    }

    //TODO: this is really inefficient...
    pub fn len(&self) -> usize {
        let mut len = 0;
        for token in &self.0 {
            match token {
                TopicToken::String(string) => len += string.len(),
                _ => len += 1,
            }
        }

        return len;
    }
}

#[derive(PartialEq, PartialOrd, Eq, Ord, Clone, Debug, Hash)]
pub struct TopicName(Vec<TopicToken>);

impl TopicName {
    pub fn decode(bytes: &mut Bytes) -> Result<(Self, &mut Bytes), DecodeError> {
        let string = decode_utf8(bytes)?;
        let tokens = Self::from_str(string.as_str())?;
        return Ok((tokens, bytes));
    }

    pub fn from_str(str: &'_ str) -> Result<Self, DecodeError> {
        if str.len() == 0 {
            return Err(DecodeError::new(
                DecodeErrorKind::MalformedTopicName,
                format!("Invalid topic name: {str}"),
            ));
        }

        let mut tokens = Vec::new();
        let mut strs = str.split('/');

        loop {
            if let Some(str) = strs.next() {
                let token = TopicToken::from_str(str);
                match token {
                    // valid token for a TopicName
                    TopicToken::String(_) | TopicToken::Dollar(_) => {
                        tokens.push(token);
                    }
                    // TopicName tokens cannot contain wildcards.
                    _ => {
                        return Err(DecodeError::new(
                            DecodeErrorKind::MalformedTopicName,
                            format!("Invalid topic name: {str}"),
                        ))
                    }
                }
            } else {
                break;
            }
        }

        return Ok(Self(tokens));
    }

    // this is really inefficient...
    pub fn to_string(self) -> String {
        let mut string = String::new();
        for token in self.into_iter() {
            string += token.as_str();
            string.push('/');
        }
        string.pop();
        return string;
    }

    // this is really inefficient... should be a property
    pub fn len(&self) -> usize {
        let mut len = 0;
        for token in &self.0 {
            match token {
                TopicToken::String(string) => len += string.len() + 1,
                _ => len += 2,
            }
        }

        return len - 1;
    }
}

impl IntoIterator for TopicName {
    type Item = TopicToken;
    type IntoIter = std::vec::IntoIter<TopicToken>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl IntoIterator for TopicFilter {
    type Item = TopicToken;
    type IntoIter = std::vec::IntoIter<TopicToken>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[derive(PartialOrd, Eq, Ord, Clone, Debug, Hash)]
pub enum TopicToken {
    Dollar(String),
    MultiLevel,
    SingleLevel,
    String(String),
}

impl PartialEq for TopicToken {
    fn eq(&self, other: &Self) -> bool {
        match self {
            TopicToken::Dollar(string) => match other {
                TopicToken::Dollar(o_string) => o_string == string,
                _ => false,
            },

            TopicToken::MultiLevel | TopicToken::SingleLevel => match other {
                TopicToken::Dollar(_) => false,
                _ => return true,
            },

            TopicToken::String(string) => match other {
                TopicToken::MultiLevel | TopicToken::SingleLevel => true,
                TopicToken::String(o_string) => string == o_string,
                _ => false,
            },
        }
    }
}

impl TopicToken {
    fn as_str<'a>(&'a self) -> &'a str {
        match self {
            Self::Dollar(string) => return string.as_str(),
            Self::MultiLevel => return "#",
            Self::SingleLevel => return "+",
            Self::String(string) => return string.as_str(),
        }
    }

    fn from_str(string: &'_ str) -> Self {
        if string.starts_with('$') {
            return Self::Dollar(String::from(string));
        }
        match string {
            "#" => return Self::MultiLevel,
            "+" => return Self::SingleLevel,
            _ => return Self::String(String::from(string)),
        }
    }
}

/// A single requested filter/QoS pair carried in a SUBSCRIBE payload.
#[derive(Clone, Debug, PartialEq)]
pub struct TopicSubscription {
    filter: TopicFilter,
    qos: QosLevel,
}

impl TopicSubscription {
    pub fn new(filter: TopicFilter, qos: QosLevel) -> Self {
        return Self { filter, qos };
    }

    pub fn filter(&self) -> &TopicFilter {
        return &self.filter;
    }

    pub fn qos(&self) -> QosLevel {
        return self.qos;
    }
}

/// One entry of a SUBSCRIBE payload. `Err` marks a filter that failed to parse but still
/// occupies a slot, since SUBACK must return one return code per requested filter in order.
#[derive(Clone, Debug, PartialEq)]
pub enum TopicFilterResult {
    Ok(TopicSubscription),
    Err,
}

#[cfg(test)]
mod parsing {

    use super::TopicFilter;

    #[test]
    fn topic_filter_multi_level_wildcard() {
        assert!(TopicFilter::from_str("sport/tennis/player1/#").is_ok());

        // multi-level wildcards must be at the end of a filter.
        assert!(TopicFilter::from_str("sport/tennis/#/ranking").is_err())
    }

    #[test]
    fn topic_filter_single_level_wildcard() {
        assert!(TopicFilter::from_str("sport/tennis/+").is_ok());
        assert!(TopicFilter::from_str("+/+").is_ok());
        assert!(TopicFilter::from_str("/+").is_ok());
    }

    #[test]
    fn topic_begining_with_dollar_sign() {
        let filter = TopicFilter::from_str("$SYS/monitor/+").unwrap();
        assert_eq!(filter.to_string(), "$SYS/monitor/+");
    }

    #[test]
    fn topic_name_round_trip() {
        use super::TopicName;

        let name = TopicName::from_str("sport/tennis/player1").unwrap();
        assert_eq!(name.to_string(), "sport/tennis/player1");
        assert_eq!(name.len(), 3);
    }
}
