pub fn codeblock_fixture() -> &'static str {
    return r#"
Here's the refined script, split into named steps.

```python
from playwright.sync_api import sync_playwright

def open_inbox(page):
    page.goto("https://mail.example.com")
```

If you'd rather keep the login state, swap the launch call for this.

```
context = playwright.chromium.launch_persistent_context("user_data", headless=False)
```

And to run it:

```bash
python3 generated_bot.py
```

That's it!
"#
    .trim();
}

pub fn recording_fixture() -> &'static str {
    return r#"
from playwright.sync_api import Playwright, sync_playwright, expect


def run(playwright: Playwright) -> None:
    browser = playwright.chromium.launch(headless=False)
    context = browser.new_context()
    page = context.new_page()
    page.goto("https://example.com/")
    page.get_by_role("link").filter(has_text=re.compile(r"^$")).nth(1).click()
    page.wait_for_timeout(3000)
    context.close()
    browser.close()


with sync_playwright() as playwright:
    run(playwright)
"#
    .trim_start();
}
