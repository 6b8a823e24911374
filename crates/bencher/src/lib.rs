use http::Request;

#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    fixture: Fixture,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, fixture: Fixture) -> Self {
        Self { name, group, fixture }
    }

    pub fn small(name: &'static str, fixture: Fixture) -> Self {
        Self::new(name, TestGroup::Small, fixture)
    }

    pub fn normal(name: &'static str, fixture: Fixture) -> Self {
        Self::new(name, TestGroup::Normal, fixture)
    }

    pub fn large(name: &'static str, fixture: Fixture) -> Self {
        Self::new(name, TestGroup::Large, fixture)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }
}

/// Request headers and a response body to feed the edge stages with.
#[derive(Debug, Copy, Clone)]
pub struct Fixture {
    headers: &'static [(&'static str, &'static str)],
    body: &'static str,
    repeat: usize,
}

impl Fixture {
    pub const fn new(headers: &'static [(&'static str, &'static str)], body: &'static str, repeat: usize) -> Self {
        Self { headers, body, repeat }
    }

    pub const fn headers(headers: &'static [(&'static str, &'static str)]) -> Self {
        Self::new(headers, "", 0)
    }

    /// A `GET /` request carrying the fixture headers.
    pub fn request(&self) -> Request<()> {
        let mut request = Request::new(());
        *request.uri_mut() = http::Uri::from_static("/");
        for (name, value) in self.headers {
            if let (Ok(name), Ok(value)) = (http::HeaderName::try_from(*name), http::HeaderValue::from_str(value)) {
                request.headers_mut().append(name, value);
            }
        }
        request
    }

    /// The body, `repeat` times over.
    pub fn body(&self) -> String {
        self.body.repeat(self.repeat)
    }

    pub fn body_len(&self) -> usize {
        self.body.len() * self.repeat
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}
